use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PricingModel {
    Free,
    Freemium,
    Paid,
    Enterprise,
    #[default]
    Unknown,
}

impl PricingModel {
    pub const NAMES: &'static [&'static str] =
        &["Free", "Freemium", "Paid", "Enterprise", "Unknown"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingModel::Free => "Free",
            PricingModel::Freemium => "Freemium",
            PricingModel::Paid => "Paid",
            PricingModel::Enterprise => "Enterprise",
            PricingModel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PricingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts extracted from a tool's site. Every field has an "unknown" default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolFacts {
    pub website: Option<String>,
    pub pricing_model: PricingModel,
    pub is_open_source: Option<bool>,
    pub tech_stack: BTreeSet<String>,
    pub language_support: BTreeSet<String>,
    pub has_api: bool,
    pub integrations: BTreeSet<String>,
    pub description: String,
}

/// One analyzed candidate. Built once by evidence gathering and never changed after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub pricing_model: PricingModel,
    /// `None` means unknown.
    #[serde(default)]
    pub is_open_source: Option<bool>,
    #[serde(default)]
    pub tech_stack: BTreeSet<String>,
    #[serde(default)]
    pub language_support: BTreeSet<String>,
    #[serde(default)]
    pub has_api: bool,
    #[serde(default)]
    pub integrations: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
}

impl ToolRecord {
    /// `name` always wins over anything the model said the tool is called.
    /// `site_url` fills `website` when the facts do not carry one.
    pub fn from_facts(name: &str, site_url: Option<&str>, facts: ToolFacts) -> Self {
        Self {
            name: name.to_string(),
            website: facts.website.or_else(|| site_url.map(|s| s.to_string())),
            pricing_model: facts.pricing_model,
            is_open_source: facts.is_open_source,
            tech_stack: facts.tech_stack,
            language_support: facts.language_support,
            has_api: facts.has_api,
            integrations: facts.integrations,
            description: facts.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolNames {
    pub tool_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Recommendation {
    pub recommendation: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TOOL_FACTS;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn name_is_forced_and_site_url_fills_website() {
        let facts = ToolFacts {
            description: "x".to_string(),
            ..ToolFacts::default()
        };
        let r = ToolRecord::from_facts("Supabase", Some("https://supabase.com"), facts);
        assert_eq!(r.name, "Supabase");
        assert_eq!(r.website.as_deref(), Some("https://supabase.com"));
    }

    #[test]
    fn record_json_has_every_key() {
        let r = ToolRecord::from_facts("X", None, ToolFacts::default());
        let v = serde_json::to_value(&r).unwrap();
        for k in [
            "name",
            "website",
            "pricing_model",
            "is_open_source",
            "tech_stack",
            "language_support",
            "has_api",
            "integrations",
            "description",
        ] {
            assert!(v.get(k).is_some(), "missing key {k}");
        }
        assert_eq!(v["pricing_model"], json!("Unknown"));
        assert_eq!(v["is_open_source"], serde_json::Value::Null);
    }

    fn arb_set() -> impl Strategy<Value = BTreeSet<String>> {
        prop::collection::btree_set("x[a-z0-9+#]{1,10}", 0..5)
    }

    fn arb_pricing() -> impl Strategy<Value = PricingModel> {
        prop_oneof![
            Just(PricingModel::Free),
            Just(PricingModel::Freemium),
            Just(PricingModel::Paid),
            Just(PricingModel::Enterprise),
            Just(PricingModel::Unknown),
        ]
    }

    proptest! {
        // A record written out and read back through the facts schema keeps every field.
        #[test]
        fn record_survives_serialize_and_schema_reparse(
            name in "[A-Za-z][A-Za-z0-9]{0,15}",
            website in proptest::option::of("https://[a-z]{1,10}\\.dev"),
            pricing_model in arb_pricing(),
            is_open_source in proptest::option::of(any::<bool>()),
            tech_stack in arb_set(),
            language_support in arb_set(),
            has_api in any::<bool>(),
            integrations in arb_set(),
            description in "[A-Za-z][A-Za-z ,.]{0,40}[a-z.]",
        ) {
            let rec = ToolRecord {
                name, website, pricing_model, is_open_source, tech_stack,
                language_support, has_api, integrations, description,
            };
            let text = serde_json::to_string(&rec).unwrap();

            let direct: ToolRecord = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(&direct, &rec);

            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            let facts: ToolFacts = TOOL_FACTS.validate(value).unwrap().into_typed().unwrap();
            let again = ToolRecord::from_facts(&rec.name, None, facts);
            prop_assert_eq!(again, rec);
        }
    }
}

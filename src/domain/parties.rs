//! Contract party and role definitions.
//!
//! Japanese contracts name their parties once in the preamble
//! (`株式会社ABC（以下「甲」という）`) and refer to them by label afterwards.
//! Labels and structural terms are never masked, and the entity defined as the
//! first party is treated as the document owner's own name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Only the preamble is scanned.
pub const MAX_SCAN_CHARS: usize = 8000;

pub const TRADITIONAL_LABELS: [&str; 10] =
    ["甲", "乙", "丙", "丁", "戊", "己", "庚", "辛", "壬", "癸"];

pub const KNOWN_ROLE_NAMES: [&str; 30] = [
    "委託者",
    "受託者",
    "甲",
    "乙",
    "丙",
    "丁",
    "売主",
    "買主",
    "貸主",
    "借主",
    "賃貸人",
    "賃借人",
    "注文者",
    "請負人",
    "委任者",
    "受任者",
    "ライセンサー",
    "ライセンシー",
    "開示者",
    "受領者",
    "雇用者",
    "被雇用者",
    "出資者",
    "運営者",
    "本ベンダー",
    "本クライアント",
    "サービス提供者",
    "利用者",
    "発注者",
    "受注者",
];

pub const STRUCTURAL_TERMS: [&str; 17] = [
    "本契約",
    "本覚書",
    "本合意書",
    "本協定",
    "本規約",
    "本約款",
    "本誓約書",
    "本件",
    "本取引",
    "本業務",
    "本サービス",
    "本製品",
    "本ソフトウェア",
    "本システム",
    "本書",
    "本条",
    "本項",
];

static PARTY_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)(?:^|[。、，,\n・と])\s*(?P<entity>[^\s（(「『。、，,]{2,60}?)\s*(?:（|\()\s*以下\s*[「『｢"](?P<label>[^」』｣"]{1,20})[」』｣"]\s*という\s*(?:。|）|\))"#,
    )
    .expect("Valid party definition regex")
});

static REVERSE_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)[「『｢"](?P<label>[^」』｣"]{1,10})[」』｣"]\s*(?:（|\()\s*(?P<entity>.{2,60}?)\s*(?:）|\))"#,
    )
    .expect("Valid reverse party regex")
});

static ROLE_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)以下\s*[「『｢"](?P<label>[^」』｣"]{1,20})[」』｣"]\s*という"#)
        .expect("Valid role definition regex")
});

static ROLE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:委託者|受託者|売主|買主|貸主|借主|甲|乙)[・:：]?\s*")
        .expect("Valid role prefix regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyPosition {
    /// One of 甲乙丙丁…
    Party,
    Role,
    Structural,
    Custom,
}

impl PartyPosition {
    fn classify(label: &str) -> Self {
        if TRADITIONAL_LABELS.contains(&label) {
            Self::Party
        } else if KNOWN_ROLE_NAMES.contains(&label) {
            Self::Role
        } else if STRUCTURAL_TERMS.contains(&label) {
            Self::Structural
        } else {
            Self::Custom
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyDefinition {
    pub label: String,
    /// Empty when the definition names no entity.
    pub entity_name: String,
    pub position: PartyPosition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartyExtraction {
    pub definitions: Vec<PartyDefinition>,
    /// Labels and structural terms that must never be masked.
    pub allowlist_labels: Vec<String>,
    pub self_names: Vec<String>,
    pub counter_names: Vec<String>,
    pub entity_names: Vec<String>,
}

impl PartyExtraction {
    fn push_definition(&mut self, label: &str, entity: String, position: PartyPosition) {
        let entity = if entity.chars().count() >= 2 {
            entity
        } else {
            String::new()
        };
        self.definitions.push(PartyDefinition {
            label: label.to_string(),
            entity_name: entity.clone(),
            position,
        });
        push_unique(&mut self.allowlist_labels, label);
        if !entity.is_empty() {
            push_unique(&mut self.entity_names, &entity);
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Strips role prefixes, conjunctions and trailing particles from a name
/// captured in a definition.
pub fn clean_entity_name(raw: &str) -> String {
    const PREFIXES: [&str; 10] = ["と", "及び", "および", "・", "、", "，", "\n", "\r", "）", ")"];
    const PARTICLES: [char; 6] = ['は', 'が', 'の', 'を', 'に', 'と'];

    let mut s = ROLE_PREFIX.replace(raw.trim(), "").trim().to_string();
    loop {
        let before = s.clone();
        for prefix in PREFIXES {
            while s.starts_with(prefix) && s.len() > prefix.len() {
                s = s[prefix.len()..].trim().to_string();
            }
        }
        for particle in PARTICLES {
            if s.ends_with(particle) && s.chars().count() > 2 {
                s.pop();
                s = s.trim().to_string();
            }
        }
        if s == before {
            return s;
        }
    }
}

/// Scans the preamble of `text` for party and role definitions.
pub fn extract_parties(text: &str) -> PartyExtraction {
    let head = match text.char_indices().nth(MAX_SCAN_CHARS) {
        Some((byte, _)) => &text[..byte],
        None => text,
    };
    let mut result = PartyExtraction::default();
    let mut seen: Vec<String> = Vec::new();

    for caps in PARTY_DEF.captures_iter(head) {
        let label = caps.name("label").map_or("", |m| m.as_str().trim());
        if label.is_empty() || seen.iter().any(|s| s == label) {
            continue;
        }
        seen.push(label.to_string());

        let entity = clean_entity_name(caps.name("entity").map_or("", |m| m.as_str()));
        let position = PartyPosition::classify(label);
        if entity.chars().count() >= 2 {
            if label == "甲" || (position == PartyPosition::Role && result.self_names.is_empty())
            {
                push_unique(&mut result.self_names, &entity);
            } else if label == "乙" {
                push_unique(&mut result.counter_names, &entity);
            }
        }
        result.push_definition(label, entity, position);
    }

    for caps in REVERSE_DEF.captures_iter(head) {
        let label = caps.name("label").map_or("", |m| m.as_str().trim());
        if label.is_empty() || seen.iter().any(|s| s == label) {
            continue;
        }
        seen.push(label.to_string());

        let entity = clean_entity_name(caps.name("entity").map_or("", |m| m.as_str()));
        let position = if TRADITIONAL_LABELS.contains(&label) {
            PartyPosition::Party
        } else {
            PartyPosition::Custom
        };
        result.push_definition(label, entity, position);
    }

    for caps in ROLE_DEF.captures_iter(head) {
        let label = caps.name("label").map_or("", |m| m.as_str().trim());
        if label.is_empty() || seen.iter().any(|s| s == label) {
            continue;
        }
        seen.push(label.to_string());
        result.push_definition(label, String::new(), PartyPosition::classify(label));
    }

    for term in TRADITIONAL_LABELS.iter().chain(STRUCTURAL_TERMS.iter()) {
        push_unique(&mut result.allowlist_labels, term);
    }

    log::debug!(
        "Party extraction: {} definition(s), self={:?}, counter={:?}",
        result.definitions.len(),
        result.self_names,
        result.counter_names
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "株式会社サンプル（以下「甲」という）と有限会社テスト（以下「乙」という）は、以下のとおり契約を締結する。";

    #[test]
    fn test_self_and_counter_names() {
        let parties = extract_parties(PREAMBLE);
        assert_eq!(parties.self_names, vec!["株式会社サンプル"]);
        assert_eq!(parties.counter_names, vec!["有限会社テスト"]);
        assert_eq!(parties.definitions.len(), 2);
        assert_eq!(parties.definitions[0].position, PartyPosition::Party);
    }

    #[test]
    fn test_labels_and_structural_terms_allowlisted() {
        let parties = extract_parties(PREAMBLE);
        for term in ["甲", "乙", "癸", "本契約", "本項"] {
            assert!(parties.allowlist_labels.iter().any(|l| l == term), "{}", term);
        }
    }

    #[test]
    fn test_role_definition_without_entity() {
        let parties = extract_parties("この業務を行う者（以下「受託者」という。）");
        assert!(parties.allowlist_labels.iter().any(|l| l == "受託者"));
    }

    #[test]
    fn test_reverse_definition() {
        let parties = extract_parties("「甲」（サンプル商事株式会社）は");
        assert_eq!(parties.definitions[0].label, "甲");
        assert_eq!(parties.definitions[0].entity_name, "サンプル商事株式会社");
        assert!(parties.self_names.is_empty());
    }

    #[test]
    fn test_clean_entity_name() {
        assert_eq!(clean_entity_name("委託者・株式会社ABC"), "株式会社ABC");
        assert_eq!(clean_entity_name("及び株式会社XYZは"), "株式会社XYZ");
    }

    #[test]
    fn test_scan_limited_to_preamble() {
        let text = format!("{}株式会社後方（以下「甲」という）", "あ".repeat(MAX_SCAN_CHARS));
        assert!(extract_parties(&text).self_names.is_empty());
    }
}

//! Granularity reduction for Japanese addresses.

use super::dictionary::load_terms;
use crate::config::AddressGranularity;
use crate::error::RedactorResult;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

pub const FULL_MASK: &str = "[ADDRESS]";

const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県", "茨城県", "栃木県",
    "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県", "新潟県", "富山県", "石川県", "福井県",
    "山梨県", "長野県", "岐阜県", "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府",
    "兵庫県", "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県", "徳島県",
    "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県", "熊本県", "大分県", "宮崎県",
    "鹿児島県", "沖縄県",
];

static PREF_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(..??[都道府県])(.*)").expect("Valid prefecture regex"));

static MUNICIPALITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.{1,10}?[市区町村])").expect("Valid municipality regex"));

/// Place-name lists used for longest-prefix matching.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    prefectures: Vec<String>,
    municipalities: Vec<String>,
}

impl Gazetteer {
    pub fn new(prefectures: Vec<String>, municipalities: Vec<String>) -> Self {
        Self {
            prefectures,
            municipalities,
        }
    }

    /// The 47 prefectures, no municipalities.
    pub fn builtin() -> Self {
        Self::new(PREFECTURES.iter().map(|p| p.to_string()).collect(), Vec::new())
    }

    /// Built-in prefectures extended by `prefectures.txt` and
    /// `municipalities.txt` in `dir`, when present.
    pub fn load_dir(dir: &Path) -> RedactorResult<Self> {
        let mut gazetteer = Self::builtin();
        for p in load_terms(&dir.join("prefectures.txt"))? {
            if !gazetteer.prefectures.contains(&p) {
                gazetteer.prefectures.push(p);
            }
        }
        gazetteer.municipalities = load_terms(&dir.join("municipalities.txt"))?;
        Ok(gazetteer)
    }

    /// Reduces an address to prefecture or municipality level.
    pub fn mask_address(&self, original: &str, granularity: AddressGranularity) -> String {
        let s = original.trim();
        if s.is_empty() {
            return s.to_string();
        }
        if granularity == AddressGranularity::FullMask {
            return FULL_MASK.to_string();
        }

        let (pref, rest) = match longest_prefix(s, &self.prefectures) {
            Some(p) => (p, &s[p.len()..]),
            None => match PREF_SPLIT.captures(s) {
                Some(caps) => match (caps.get(1), caps.get(2)) {
                    (Some(p), Some(r)) => (p.as_str(), r.as_str()),
                    _ => return FULL_MASK.to_string(),
                },
                None => return FULL_MASK.to_string(),
            },
        };

        if granularity == AddressGranularity::UntilPref {
            return pref.to_string();
        }

        if let Some(muni) = longest_prefix(s, &self.municipalities) {
            if muni.starts_with(pref) {
                return muni.to_string();
            }
        }

        match MUNICIPALITY.captures(rest).and_then(|c| c.get(1)) {
            Some(m) => format!("{}{}", pref, m.as_str()),
            None => pref.to_string(),
        }
    }
}

fn longest_prefix<'a>(s: &str, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .filter(|c| !c.is_empty() && s.starts_with(c.as_str()))
        .max_by_key(|c| c.len())
        .map(String::as_str)
}

//! Exam publisher detection from page text.

use serde::{Deserialize, Serialize};

use crate::utils::matching_key;

/// Exam producer whose layout conventions a page follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherFormat {
    #[default]
    Generic,
    Osym,
    Meb,
    Palme,
    Karekok,
    Limit,
    BilgiSarmal,
    Apotemi,
    Endemik,
    HizVeRenk,
}

impl PublisherFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublisherFormat::Generic => "generic",
            PublisherFormat::Osym => "osym",
            PublisherFormat::Meb => "meb",
            PublisherFormat::Palme => "palme",
            PublisherFormat::Karekok => "karekok",
            PublisherFormat::Limit => "limit",
            PublisherFormat::BilgiSarmal => "bilgi_sarmal",
            PublisherFormat::Apotemi => "apotemi",
            PublisherFormat::Endemik => "endemik",
            PublisherFormat::HizVeRenk => "hiz_ve_renk",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "generic" => Some(PublisherFormat::Generic),
            "osym" | "ösym" => Some(PublisherFormat::Osym),
            "meb" => Some(PublisherFormat::Meb),
            "palme" => Some(PublisherFormat::Palme),
            "karekok" | "karekök" => Some(PublisherFormat::Karekok),
            "limit" => Some(PublisherFormat::Limit),
            "bilgi_sarmal" | "bilgisarmal" => Some(PublisherFormat::BilgiSarmal),
            "apotemi" => Some(PublisherFormat::Apotemi),
            "endemik" => Some(PublisherFormat::Endemik),
            "hiz_ve_renk" | "hizverenk" => Some(PublisherFormat::HizVeRenk),
            _ => None,
        }
    }
}

impl std::fmt::Display for PublisherFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keywords in folded form, each matched at a word start.
const PUBLISHER_KEYWORDS: &[(&str, PublisherFormat)] = &[
    ("osym", PublisherFormat::Osym),
    ("olcme secme ve yerlestirme", PublisherFormat::Osym),
    ("meb", PublisherFormat::Meb),
    ("milli egitim bakanligi", PublisherFormat::Meb),
    ("palme", PublisherFormat::Palme),
    ("karekok", PublisherFormat::Karekok),
    ("limit yayin", PublisherFormat::Limit),
    ("bilgi sarmal", PublisherFormat::BilgiSarmal),
    ("apotemi", PublisherFormat::Apotemi),
    ("endemik", PublisherFormat::Endemik),
    ("hiz ve renk", PublisherFormat::HizVeRenk),
];

/// Fold each word and join with single spaces, padded so word starts can be
/// matched with a leading space.
fn normalize(text: &str) -> String {
    let words: Vec<String> = text
        .split_whitespace()
        .map(matching_key)
        .filter(|w| !w.is_empty())
        .collect();
    format!(" {} ", words.join(" "))
}

/// Detect the publisher from the text of a page; [`PublisherFormat::Generic`]
/// when nothing matches.
pub fn detect_publisher(page_text: &str) -> PublisherFormat {
    let normalized = normalize(page_text);
    PUBLISHER_KEYWORDS
        .iter()
        .find(|(keyword, _)| normalized.contains(&format!(" {}", keyword)))
        .map(|(_, format)| *format)
        .unwrap_or_default()
}

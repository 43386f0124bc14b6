// Price extraction, keyed by e-commerce domain.
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Extraction strategy for a product page. `Generic` is the designated
/// fallback; adding a site means one new variant plus one registry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Amazon,
    Ebay,
    Generic,
}

/// Domain-pattern registry, matched as a substring of the URL host.
const DOMAIN_STRATEGIES: &[(&str, Strategy)] = &[
    ("amazon.", Strategy::Amazon),
    ("ebay.", Strategy::Ebay),
];

impl Strategy {
    pub fn for_url(url: &str) -> Strategy {
        match reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        {
            Some(host) => Self::for_domain(&host),
            None => Strategy::Generic,
        }
    }

    pub fn for_domain(domain: &str) -> Strategy {
        DOMAIN_STRATEGIES
            .iter()
            .find(|(pattern, _)| domain.contains(pattern))
            .map(|(_, strategy)| *strategy)
            .unwrap_or(Strategy::Generic)
    }
}

const AMAZON_PRICE_SELECTORS: &[&str] = &[
    ".a-price .a-offscreen",
    ".a-price-whole",
    "#price_inside_buybox",
    ".a-price-range .a-offscreen",
    "#apex_desktop .a-price .a-offscreen",
];

const EBAY_PRICE_SELECTORS: &[&str] = &[
    ".mainPrice .price",
    ".u-flL .price",
    ".notranslate",
    ".display-price",
];

/// Class-name fragments that commonly mark a price-bearing element.
const GENERIC_PRICE_CLASSES: &[&str] = &["price", "cost", "amount", "value", "total"];

/// Extracts a numeric price from raw page content, or `None` when the page
/// holds no recognizable price.
pub fn extract_price(html: &str, strategy: Strategy) -> Option<f64> {
    let document = Html::parse_document(html);
    match strategy {
        Strategy::Amazon => select_first_price(&document, AMAZON_PRICE_SELECTORS),
        Strategy::Ebay => select_first_price(&document, EBAY_PRICE_SELECTORS),
        Strategy::Generic => extract_generic(&document),
    }
}

fn select_first_price(document: &Html, selectors: &[&str]) -> Option<f64> {
    for selector in selectors {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element.text().collect::<String>();
            if let Some(price) = parse_price_text(&text) {
                return Some(price);
            }
        }
    }
    None
}

fn extract_generic(document: &Html) -> Option<f64> {
    for class in GENERIC_PRICE_CLASSES {
        let Ok(selector) = Selector::parse(&format!("[class*=\"{class}\"]")) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element.text().collect::<String>();
            if let Some(price) = parse_price_text(&text) {
                // Sub-unit matches are usually ratings or badge counters.
                if price > 1.0 {
                    return Some(price);
                }
            }
        }
    }

    // Last resort: currency-symbol pattern over the whole page text.
    let text = document.root_element().text().collect::<String>();
    for found in currency_pattern().find_iter(&text) {
        if let Some(price) = parse_price_text(found.as_str()) {
            if price > 1.0 {
                return Some(price);
            }
        }
    }
    None
}

fn currency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[£$€¥₹]\s*\d[\d.,]*").expect("valid pattern"))
}

/// Parses a displayed price into a number, stripping currency symbols and
/// normalizing thousands/decimal separators. When both separators appear the
/// one further right is taken as the decimal mark, so `1,299.99` and
/// `1.299,00` both parse.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if dot > comma => cleaned.replace(',', ""),
        (Some(_), Some(_)) => cleaned.replace('.', "").replace(',', "."),
        (Some(comma), None) => {
            // A lone comma is decimal only in the two-decimals European form.
            if cleaned.len() - comma == 3 && cleaned.matches(',').count() == 1 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned,
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
}

use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::path::Path;

/// One bookable service or add-on from the offer catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Offer catalog loaded once at startup from `offers.json`. Used only
/// to enrich booking records with display names; a missing file or an
/// unknown id never blocks a booking.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    offers: HashMap<String, Offer>,
}

impl Catalog {
    pub fn empty() -> Self {
        Catalog::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Offer catalog {} not readable ({}), continuing without it", path.display(), e);
                return Catalog::empty();
            }
        };

        match serde_json::from_str::<Vec<Offer>>(&text) {
            Ok(list) => {
                log::info!("Loaded {} offers from {}", list.len(), path.display());
                Catalog {
                    offers: list.into_iter().map(|o| (o.id.clone(), o)).collect(),
                }
            }
            Err(e) => {
                log::warn!("Offer catalog {} is malformed ({}), continuing without it", path.display(), e);
                Catalog::empty()
            }
        }
    }

    pub fn resolve_display_name(&self, id: &str) -> Option<&str> {
        self.offers.get(id).map(|o| o.name.as_str())
    }

    pub fn offers(&self) -> Vec<&Offer> {
        let mut list: Vec<&Offer> = self.offers.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_known_offer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offers.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"[{{"id":"lash-fill","name":"Lash Fill","price":500}}]"#
        )
        .unwrap();

        let catalog = Catalog::load(&path);
        assert_eq!(catalog.resolve_display_name("lash-fill"), Some("Lash Fill"));
        assert_eq!(catalog.resolve_display_name("nope"), None);
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        let catalog = Catalog::load("/nonexistent/offers.json");
        assert!(catalog.offers().is_empty());
    }
}

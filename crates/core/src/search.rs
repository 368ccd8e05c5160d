use serde::{Deserialize, Serialize};

use crate::models::Tour;

pub const TOURS_PER_PAGE: usize = 9;
pub const RELATED_TOURS: usize = 3;

/// Raw query string values; anything unparsable is ignored rather than
/// rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TourSearchParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TourQuery {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub page: usize,
}

impl TourQuery {
    pub fn from_params(params: &TourSearchParams) -> Self {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            search: text(&params.search).map(|value| value.to_lowercase()),
            category_id: text(&params.category),
            min_price_cents: params.min_price.as_deref().and_then(parse_price_cents),
            max_price_cents: params.max_price.as_deref().and_then(parse_price_cents),
            page: params
                .page
                .as_deref()
                .and_then(|value| value.trim().parse::<usize>().ok())
                .filter(|page| *page > 0)
                .unwrap_or(1),
        }
    }

    pub fn matches(&self, tour: &Tour) -> bool {
        if !tour.is_active {
            return false;
        }
        if let Some(needle) = &self.search {
            let hit = [&tour.title, &tour.destination, &tour.description]
                .iter()
                .any(|field| field.to_lowercase().contains(needle.as_str()));
            if !hit {
                return false;
            }
        }
        if let Some(category_id) = &self.category_id {
            if &tour.category_id != category_id {
                return false;
            }
        }
        if let Some(min) = self.min_price_cents {
            if tour.price_cents < min {
                return false;
            }
        }
        if let Some(max) = self.max_price_cents {
            if tour.price_cents > max {
                return false;
            }
        }
        true
    }
}

/// Parses a price in currency units ("120", "99.5") into cents.
pub fn parse_price_cents(value: &str) -> Option<i64> {
    let value: f64 = value.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 || value > (i64::MAX / 100) as f64 {
        return None;
    }
    Some((value * 100.0).round() as i64)
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            pages: self.pages,
        }
    }
}

pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let total = items.len();
    let pages = total.div_ceil(per_page);
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();
    Page {
        items,
        page,
        per_page,
        total,
        pages,
    }
}

pub fn search_tours(mut tours: Vec<Tour>, query: &TourQuery) -> Page<Tour> {
    tours.retain(|tour| query.matches(tour));
    tours.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    paginate(tours, query.page, TOURS_PER_PAGE)
}

pub fn related_tours(tours: &[Tour], tour: &Tour) -> Vec<Tour> {
    tours
        .iter()
        .filter(|other| {
            other.is_active && other.category_id == tour.category_id && other.tour_id != tour.tour_id
        })
        .take(RELATED_TOURS)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, DEFAULT_CURRENCY};
    use chrono::{Duration, Utc};

    fn tour(id: &str, title: &str, category: &str, price_cents: i64, age_minutes: i64) -> Tour {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Tour {
            tour_id: id.to_string(),
            category_id: category.to_string(),
            title: title.to_string(),
            description: format!("{title} with a local guide"),
            destination: "Portugal".to_string(),
            price_cents,
            currency: DEFAULT_CURRENCY.to_string(),
            duration_days: 2,
            max_participants: 12,
            available_from: "2026-01-01".parse().expect("date"),
            available_to: "2026-12-31".parse().expect("date"),
            difficulty: Difficulty::Easy,
            featured: false,
            is_active: true,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn lenient_params_ignore_garbage() {
        let query = TourQuery::from_params(&TourSearchParams {
            search: Some("  Lisbon ".to_string()),
            category: Some(String::new()),
            min_price: Some("abc".to_string()),
            max_price: Some("150.5".to_string()),
            page: Some("0".to_string()),
        });
        assert_eq!(query.search.as_deref(), Some("lisbon"));
        assert_eq!(query.category_id, None);
        assert_eq!(query.min_price_cents, None);
        assert_eq!(query.max_price_cents, Some(15_050));
        assert_eq!(query.page, 1);
    }

    #[test]
    fn filters_and_orders_newest_first() {
        let mut inactive = tour("t4", "Lisbon Nights", "city", 5_000, 1);
        inactive.is_active = false;
        let tours = vec![
            tour("t1", "Lisbon Food Walk", "city", 6_000, 30),
            tour("t2", "Douro Valley Wine", "wine", 12_000, 20),
            tour("t3", "Lisbon Tram Tour", "city", 3_000, 10),
            inactive,
        ];
        let query = TourQuery {
            search: Some("lisbon".to_string()),
            page: 1,
            ..TourQuery::default()
        };
        let page = search_tours(tours.clone(), &query);
        let ids: Vec<_> = page.items.iter().map(|tour| tour.tour_id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t1"]);

        let priced = TourQuery {
            min_price_cents: Some(4_000),
            max_price_cents: Some(10_000),
            page: 1,
            ..TourQuery::default()
        };
        let page = search_tours(tours, &priced);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].tour_id, "t1");
    }

    #[test]
    fn pages_hold_nine_tours() {
        let tours: Vec<Tour> = (0..20)
            .map(|n| tour(&format!("t{n}"), "Coastal Hike", "hike", 1_000, n))
            .collect();
        let query = TourQuery {
            page: 3,
            ..TourQuery::default()
        };
        let page = search_tours(tours, &query);
        assert_eq!(page.pages, 3);
        assert_eq!(page.items.len(), 2);
        assert!(!page.has_next());
    }

    #[test]
    fn related_tours_share_category() {
        let base = tour("t1", "A", "city", 1_000, 1);
        let tours = vec![
            base.clone(),
            tour("t2", "B", "city", 1_000, 2),
            tour("t3", "C", "wine", 1_000, 3),
            tour("t4", "D", "city", 1_000, 4),
            tour("t5", "E", "city", 1_000, 5),
            tour("t6", "F", "city", 1_000, 6),
        ];
        let related = related_tours(&tours, &base);
        assert_eq!(related.len(), 3);
        assert!(related.iter().all(|tour| tour.category_id == "city" && tour.tour_id != "t1"));
    }
}

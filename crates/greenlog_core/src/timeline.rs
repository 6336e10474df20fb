//! crates/greenlog_core/src/timeline.rs
//!
//! Flattens a plant's cover photo and its log photos into one chronological sequence.

use crate::domain::{PhotoTimelineEntry, Plant};

/// Timeline id of the photo taken when the plant was added.
pub const INITIAL_PHOTO_ID: &str = "initial";

/// Builds the photo timeline of `plant`, oldest first.
///
/// The cover photo is dated with `dateAdded`, each log photo with its log's date.
/// Entries sharing a date keep their collection order (cover first, then logs
/// newest first).
pub fn derive(plant: &Plant) -> Vec<PhotoTimelineEntry> {
    let cover = plant.image.iter().map(|url| PhotoTimelineEntry {
        id: INITIAL_PHOTO_ID.to_string(),
        date: plant.date_added,
        url: url.clone(),
    });
    let log_photos = plant.logs.iter().filter_map(|log| {
        log.image.as_ref().map(|url| PhotoTimelineEntry {
            id: log.id.clone(),
            date: log.date,
            url: url.clone(),
        })
    });

    let mut photos: Vec<PhotoTimelineEntry> = cover.chain(log_photos).collect();
    photos.sort_by_key(|photo| photo.date);
    photos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Log;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn plant(image: Option<&str>, date_added: &str, logs: Vec<Log>) -> Plant {
        Plant {
            id: "p1".to_string(),
            name: "Fern".to_string(),
            species: None,
            date_added: date(date_added),
            image: image.map(str::to_string),
            logs,
        }
    }

    fn log(id: &str, on: &str, image: Option<&str>) -> Log {
        Log {
            id: id.to_string(),
            date: date(on),
            note: None,
            watered: false,
            fertilized: false,
            image: image.map(str::to_string),
        }
    }

    #[test]
    fn log_photos_are_sorted_ascending_despite_newest_first_logs() {
        let plant = plant(
            None,
            "2023-12-31",
            vec![log("l2", "2024-01-02", Some("b")), log("l1", "2024-01-01", Some("a"))],
        );

        let timeline = derive(&plant);

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].date, date("2024-01-01"));
        assert_eq!(timeline[0].url, "a");
        assert_eq!(timeline[1].date, date("2024-01-02"));
        assert_eq!(timeline[1].url, "b");
    }

    #[test]
    fn cover_photo_alone_yields_initial_entry() {
        let plant = plant(Some("x"), "2024-01-01", vec![]);

        let timeline = derive(&plant);

        assert_eq!(
            timeline,
            vec![PhotoTimelineEntry {
                id: INITIAL_PHOTO_ID.to_string(),
                date: date("2024-01-01"),
                url: "x".to_string(),
            }]
        );
    }

    #[test]
    fn plant_without_images_has_empty_timeline() {
        let plant = plant(None, "2024-01-01", vec![log("l1", "2024-01-02", None)]);
        assert!(derive(&plant).is_empty());
    }

    #[test]
    fn logs_without_photos_are_skipped() {
        let plant = plant(
            Some("cover"),
            "2024-01-01",
            vec![
                log("l3", "2024-02-01", Some("c")),
                log("l2", "2024-01-15", None),
                log("l1", "2024-01-10", Some("a")),
            ],
        );

        let ids: Vec<String> = derive(&plant).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["initial", "l1", "l3"]);
    }

    #[test]
    fn equal_dates_keep_collection_order() {
        let plant = plant(
            Some("cover"),
            "2024-01-01",
            vec![log("l2", "2024-01-01", Some("b")), log("l1", "2024-01-01", Some("a"))],
        );

        let ids: Vec<String> = derive(&plant).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["initial", "l2", "l1"]);
    }

    fn arb_log() -> impl Strategy<Value = (i64, bool)> {
        (0_i64..365, any::<bool>())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// Every image-bearing entry appears exactly once and the result is date-sorted.
        #[test]
        fn derive_is_sorted_and_keeps_only_photos(
            cover in proptest::option::of(0_i64..365),
            logs in prop::collection::vec(arb_log(), 0..12),
        ) {
            let start = date("2024-01-01");
            let mut plant = plant(None, "2024-01-01", vec![]);
            if let Some(offset) = cover {
                plant.date_added = start + chrono::Duration::days(offset);
                plant.image = Some("cover".to_string());
            }
            plant.logs = logs
                .iter()
                .enumerate()
                .map(|(i, (offset, has_photo))| Log {
                    id: format!("l{i}"),
                    date: start + chrono::Duration::days(*offset),
                    note: None,
                    watered: true,
                    fertilized: false,
                    image: has_photo.then(|| format!("photo-{i}")),
                })
                .collect();

            let timeline = derive(&plant);

            prop_assert!(timeline.windows(2).all(|pair| pair[0].date <= pair[1].date));

            let mut expected: Vec<String> = plant
                .logs
                .iter()
                .filter(|log| log.image.is_some())
                .map(|log| log.id.clone())
                .collect();
            if plant.image.is_some() {
                expected.push(INITIAL_PHOTO_ID.to_string());
            }
            let mut actual: Vec<String> = timeline.iter().map(|entry| entry.id.clone()).collect();
            expected.sort();
            actual.sort();
            prop_assert_eq!(actual, expected);
        }
    }
}

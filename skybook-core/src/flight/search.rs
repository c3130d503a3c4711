//! 航班搜索：可自由组合的过滤器

use super::manager::FlightManager;
use super::models::*;
use crate::error::{Result, ServiceError};
use chrono::NaiveDate;
use tracing::instrument;

/// 大小写不敏感的子串匹配
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl FlightManager {
    /// 搜索航班。返回的每条记录里 seats 已收敛为可预订座位
    /// （指定舱位时再按舱位收敛），没有剩余座位的航班不出现在结果里。
    /// 价格过滤作用于剩余座位中的最低价。
    #[instrument(skip(self, query))]
    pub async fn search(&self, query: &FlightSearchQuery) -> Result<Vec<Flight>> {
        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(ServiceError::PolicyViolation(
                    "min_price cannot be greater than max_price".into(),
                ));
            }
        }

        let date = match &query.departure_date {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ServiceError::PolicyViolation(
                    "invalid departure_date, expected YYYY-MM-DD".into(),
                )
            })?),
            None => None,
        };

        let mut hits = Vec::new();
        for mut flight in self.list_flights().await? {
            if let Some(origin) = &query.origin {
                if !contains_ci(&flight.origin, origin) {
                    continue;
                }
            }
            if let Some(destination) = &query.destination {
                if !contains_ci(&flight.destination, destination) {
                    continue;
                }
            }
            if let Some(airline) = &query.airline {
                if !contains_ci(&flight.airline, airline) {
                    continue;
                }
            }
            if let Some(date) = date {
                if flight.departure_at.date_naive() != date {
                    continue;
                }
            }

            flight.seats.retain(|s| {
                s.state == SeatState::Available
                    && query.class.map(|c| s.class == c).unwrap_or(true)
            });
            if flight.seats.is_empty() {
                continue;
            }

            if query.min_price.is_some() || query.max_price.is_some() {
                let cheapest = flight.seats.iter().map(|s| s.price).min().unwrap_or(0);
                if let Some(min) = query.min_price {
                    if cheapest < min {
                        continue;
                    }
                }
                if let Some(max) = query.max_price {
                    if cheapest > max {
                        continue;
                    }
                }
            }

            hits.push(flight);
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn seat(number: &str, class: SeatClass, price: u64, state: SeatState) -> Seat {
        Seat {
            number: number.to_string(),
            class,
            price,
            state,
        }
    }

    async fn seeded(dir: &TempDir) -> FlightManager {
        let mgr = FlightManager::new(dir.path());
        mgr.create_flights(vec![
            CreateFlightRequest {
                flight_number: "SB-1".to_string(),
                airline: "Skybook Air".to_string(),
                origin: "New Delhi".to_string(),
                destination: "Mumbai".to_string(),
                departure_at: Utc.with_ymd_and_hms(2026, 9, 1, 6, 0, 0).unwrap(),
                arrival_at: Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap(),
                duration: "2h".to_string(),
                seats: vec![
                    seat("1A", SeatClass::Business, 9000, SeatState::Available),
                    seat("12A", SeatClass::Economy, 3000, SeatState::Available),
                    seat("12B", SeatClass::Economy, 2800, SeatState::Booked),
                ],
            },
            CreateFlightRequest {
                flight_number: "SB-2".to_string(),
                airline: "AirExpress".to_string(),
                origin: "Delhi".to_string(),
                destination: "Chennai".to_string(),
                departure_at: Utc.with_ymd_and_hms(2026, 9, 2, 10, 0, 0).unwrap(),
                arrival_at: Utc.with_ymd_and_hms(2026, 9, 2, 12, 30, 0).unwrap(),
                duration: "2h 30m".to_string(),
                seats: vec![seat("3C", SeatClass::Economy, 4500, SeatState::Available)],
            },
            CreateFlightRequest {
                flight_number: "SB-3".to_string(),
                airline: "Skybook Air".to_string(),
                origin: "Mumbai".to_string(),
                destination: "Delhi".to_string(),
                departure_at: Utc.with_ymd_and_hms(2026, 9, 1, 18, 0, 0).unwrap(),
                arrival_at: Utc.with_ymd_and_hms(2026, 9, 1, 20, 0, 0).unwrap(),
                duration: "2h".to_string(),
                seats: vec![seat("7F", SeatClass::First, 15000, SeatState::Booked)],
            },
        ])
        .await
        .unwrap();
        mgr
    }

    #[tokio::test]
    async fn origin_filter_is_case_insensitive_substring() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded(&dir).await;

        let hits = mgr
            .search(&FlightSearchQuery {
                origin: Some("delhi".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        // "New Delhi" 与 "Delhi" 都命中；SB-3 没有可订座位不出现
        let numbers: Vec<_> = hits.iter().map(|f| f.flight_number.as_str()).collect();
        assert_eq!(numbers.len(), 2);
        assert!(numbers.contains(&"SB-1"));
        assert!(numbers.contains(&"SB-2"));
    }

    #[tokio::test]
    async fn seats_are_narrowed_to_available_and_class() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded(&dir).await;

        let hits = mgr.search(&FlightSearchQuery::default()).await.unwrap();
        let sb1 = hits.iter().find(|f| f.flight_number == "SB-1").unwrap();
        // 已售座位不出现
        assert_eq!(sb1.seats.len(), 2);

        let hits = mgr
            .search(&FlightSearchQuery {
                class: Some(SeatClass::Business),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].flight_number, "SB-1");
        assert_eq!(hits[0].seats.len(), 1);
        assert_eq!(hits[0].seats[0].class, SeatClass::Business);
    }

    #[tokio::test]
    async fn date_window_keeps_the_calendar_day() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded(&dir).await;

        let hits = mgr
            .search(&FlightSearchQuery {
                departure_date: Some("2026-09-02".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].flight_number, "SB-2");

        let err = mgr
            .search(&FlightSearchQuery {
                departure_date: Some("02-09-2026".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PolicyViolation(_)));
    }

    #[tokio::test]
    async fn price_range_applies_to_cheapest_remaining_seat() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded(&dir).await;

        // SB-1 最低可订价 3000（2800 的座位已售出）
        let hits = mgr
            .search(&FlightSearchQuery {
                min_price: Some(3000),
                max_price: Some(5000),
                ..Default::default()
            })
            .await
            .unwrap();
        let numbers: Vec<_> = hits.iter().map(|f| f.flight_number.as_str()).collect();
        assert!(numbers.contains(&"SB-1"));
        assert!(numbers.contains(&"SB-2"));

        let hits = mgr
            .search(&FlightSearchQuery {
                max_price: Some(2999),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(hits.is_empty());

        let err = mgr
            .search(&FlightSearchQuery {
                min_price: Some(100),
                max_price: Some(50),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PolicyViolation(_)));
    }

    #[tokio::test]
    async fn filters_compose() {
        let dir = TempDir::new().unwrap();
        let mgr = seeded(&dir).await;

        let hits = mgr
            .search(&FlightSearchQuery {
                origin: Some("delhi".to_string()),
                airline: Some("skybook".to_string()),
                departure_date: Some("2026-09-01".to_string()),
                class: Some(SeatClass::Economy),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].flight_number, "SB-1");
        assert_eq!(hits[0].seats.len(), 1);
        assert_eq!(hits[0].seats[0].number, "12A");
    }
}

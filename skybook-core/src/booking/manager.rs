//! 订票管理：创建、查询、取消

use super::models::*;
use crate::error::{Result, ServiceError};
use crate::flight::FlightManager;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// 订票管理器。座位占用与释放委托给 FlightManager 的串行化座位操作。
#[derive(Debug, Clone)]
pub struct BookingManager {
    data_dir: PathBuf,
    flights: FlightManager,
}

impl BookingManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, flights: FlightManager) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            flights,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.bookings_dir())?;
        Ok(())
    }

    fn bookings_dir(&self) -> PathBuf {
        self.data_dir.join("bookings")
    }

    fn booking_path(&self, id: &str) -> PathBuf {
        self.bookings_dir().join(format!("{}.json", id))
    }

    fn persist_booking(&self, booking: &Booking) -> Result<()> {
        let data = serde_json::to_vec_pretty(booking)?;
        std::fs::write(self.booking_path(&booking.id), data)?;
        Ok(())
    }

    fn load_booking(&self, id: &str) -> Result<Booking> {
        let path = self.booking_path(id);
        if !path.exists() {
            return Err(ServiceError::NotFound(format!("booking: {}", id)));
        }
        let data = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// 创建订票。乘客与座位一一对应，座位在航班上原子占用；
    /// 占用失败（不存在、已售、舱位不符）不会留下半张订单。
    #[instrument(skip(self, req))]
    pub async fn create_booking(&self, user_id: &str, req: CreateBookingRequest) -> Result<Booking> {
        self.ensure_dirs()?;

        if req.passengers.is_empty() {
            return Err(ServiceError::PolicyViolation(
                "at least one passenger is required".into(),
            ));
        }
        let mut numbers = HashSet::new();
        for passenger in &req.passengers {
            if passenger.name.trim().is_empty() {
                return Err(ServiceError::PolicyViolation(
                    "passenger name is required".into(),
                ));
            }
            if passenger.age == 0 {
                return Err(ServiceError::PolicyViolation(
                    "passenger age is required".into(),
                ));
            }
            if !numbers.insert(passenger.seat_number.clone()) {
                return Err(ServiceError::PolicyViolation(format!(
                    "seat {} requested more than once",
                    passenger.seat_number
                )));
            }
        }

        let requested: Vec<(String, crate::flight::SeatClass)> = req
            .passengers
            .iter()
            .map(|p| (p.seat_number.clone(), p.seat_class))
            .collect();
        let total_amount = self.flights.reserve_seats(&req.flight_id, &requested).await?;

        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            flight_id: req.flight_id,
            passengers: req.passengers,
            total_amount,
            payment_status: PaymentStatus::Pending,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };
        self.persist_booking(&booking)?;

        info!(
            booking_id = %booking.id,
            user_id = %user_id,
            total = booking.total_amount,
            "created booking"
        );
        Ok(booking)
    }

    /// 某用户的全部订票，新的在前
    #[instrument(skip(self))]
    pub async fn bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>> {
        self.ensure_dirs()?;
        let mut bookings = Vec::new();

        for entry in std::fs::read_dir(self.bookings_dir())? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Ok(data) = std::fs::read(&path) {
                    if let Ok(booking) = serde_json::from_slice::<Booking>(&data) {
                        if booking.user_id == user_id {
                            bookings.push(booking);
                        }
                    }
                }
            }
        }

        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    /// 按 ID 取单，只允许订票人本人访问
    #[instrument(skip(self))]
    pub async fn get_booking(&self, user_id: &str, id: &str) -> Result<Booking> {
        let booking = self.load_booking(id)?;
        if booking.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "this booking belongs to another account".into(),
            ));
        }
        Ok(booking)
    }

    /// 取消订票：座位放回可用池，支付状态转入退款。重复取消报冲突。
    #[instrument(skip(self))]
    pub async fn cancel_booking(&self, user_id: &str, id: &str) -> Result<Booking> {
        let mut booking = self.get_booking(user_id, id).await?;

        if booking.status == BookingStatus::Cancelled {
            return Err(ServiceError::Conflict("booking is already cancelled".into()));
        }

        let numbers: Vec<String> = booking
            .passengers
            .iter()
            .map(|p| p.seat_number.clone())
            .collect();
        self.flights.release_seats(&booking.flight_id, &numbers).await?;

        booking.status = BookingStatus::Cancelled;
        booking.payment_status = PaymentStatus::Refunded;
        self.persist_booking(&booking)?;

        info!(booking_id = %id, user_id = %user_id, "cancelled booking");
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::{CreateFlightRequest, Seat, SeatClass, SeatState};
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn fixtures(dir: &TempDir) -> (FlightManager, BookingManager, String) {
        let flights = FlightManager::new(dir.path());
        let bookings = BookingManager::new(dir.path(), flights.clone());
        let flight = flights
            .create_flight(CreateFlightRequest {
                flight_number: "SB-9".to_string(),
                airline: "Skybook Air".to_string(),
                origin: "Delhi".to_string(),
                destination: "Goa".to_string(),
                departure_at: Utc.with_ymd_and_hms(2026, 10, 5, 9, 0, 0).unwrap(),
                arrival_at: Utc.with_ymd_and_hms(2026, 10, 5, 11, 30, 0).unwrap(),
                duration: "2h 30m".to_string(),
                seats: vec![
                    Seat {
                        number: "5A".to_string(),
                        class: SeatClass::Economy,
                        price: 4000,
                        state: SeatState::Available,
                    },
                    Seat {
                        number: "5B".to_string(),
                        class: SeatClass::Economy,
                        price: 4200,
                        state: SeatState::Available,
                    },
                ],
            })
            .await
            .unwrap();
        (flights, bookings, flight.id)
    }

    fn passenger(name: &str, seat: &str) -> Passenger {
        Passenger {
            name: name.to_string(),
            age: 30,
            seat_number: seat.to_string(),
            seat_class: SeatClass::Economy,
        }
    }

    #[tokio::test]
    async fn create_books_seats_and_totals_prices() {
        let dir = TempDir::new().unwrap();
        let (flights, bookings, flight_id) = fixtures(&dir).await;

        let booking = bookings
            .create_booking(
                "user-1",
                CreateBookingRequest {
                    flight_id: flight_id.clone(),
                    passengers: vec![passenger("A", "5A"), passenger("B", "5B")],
                },
            )
            .await
            .unwrap();

        assert_eq!(booking.total_amount, 8200);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);

        let flight = flights.get_flight(&flight_id).await.unwrap();
        assert!(flight.seats.iter().all(|s| s.state == SeatState::Booked));

        // 同一座位无法再次成单
        let err = bookings
            .create_booking(
                "user-2",
                CreateBookingRequest {
                    flight_id: flight_id.clone(),
                    passengers: vec![passenger("C", "5A")],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_seats_in_one_request_are_rejected() {
        let dir = TempDir::new().unwrap();
        let (_, bookings, flight_id) = fixtures(&dir).await;

        let err = bookings
            .create_booking(
                "user-1",
                CreateBookingRequest {
                    flight_id,
                    passengers: vec![passenger("A", "5A"), passenger("B", "5A")],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PolicyViolation(_)));
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_user_and_newest_first() {
        let dir = TempDir::new().unwrap();
        let (_, bookings, flight_id) = fixtures(&dir).await;

        let first = bookings
            .create_booking(
                "user-1",
                CreateBookingRequest {
                    flight_id: flight_id.clone(),
                    passengers: vec![passenger("A", "5A")],
                },
            )
            .await
            .unwrap();
        let second = bookings
            .create_booking(
                "user-1",
                CreateBookingRequest {
                    flight_id: flight_id.clone(),
                    passengers: vec![passenger("B", "5B")],
                },
            )
            .await
            .unwrap();

        let mine = bookings.bookings_for_user("user-1").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].created_at >= mine[1].created_at);
        assert!(mine.iter().any(|b| b.id == first.id));
        assert!(mine.iter().any(|b| b.id == second.id));

        assert!(bookings.bookings_for_user("user-2").await.unwrap().is_empty());

        let err = bookings.get_booking("user-2", &first.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn cancel_releases_seats_and_is_not_repeatable() {
        let dir = TempDir::new().unwrap();
        let (flights, bookings, flight_id) = fixtures(&dir).await;

        let booking = bookings
            .create_booking(
                "user-1",
                CreateBookingRequest {
                    flight_id: flight_id.clone(),
                    passengers: vec![passenger("A", "5A")],
                },
            )
            .await
            .unwrap();

        let cancelled = bookings.cancel_booking("user-1", &booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);

        let flight = flights.get_flight(&flight_id).await.unwrap();
        let seat = flight.seats.iter().find(|s| s.number == "5A").unwrap();
        assert_eq!(seat.state, SeatState::Available);

        let err = bookings.cancel_booking("user-1", &booking.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // 释放后的座位可以重新预订
        bookings
            .create_booking(
                "user-3",
                CreateBookingRequest {
                    flight_id,
                    passengers: vec![passenger("C", "5A")],
                },
            )
            .await
            .unwrap();
    }
}

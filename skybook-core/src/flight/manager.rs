//! 航班库存管理：存储、唯一航班号索引、座位状态迁移

use super::models::*;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// 航班管理器。座位状态的所有写入都经过 seat_guard 串行化，
/// 两个并发订票请求不可能同时抢到同一个座位。
#[derive(Debug, Clone)]
pub struct FlightManager {
    data_dir: PathBuf,
    seat_guard: Arc<Mutex<()>>,
}

impl FlightManager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            seat_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.flights_dir())?;
        Ok(())
    }

    fn flights_dir(&self) -> PathBuf {
        self.data_dir.join("flights")
    }

    fn flight_path(&self, id: &str) -> PathBuf {
        self.flights_dir().join(format!("{}.json", id))
    }

    fn index_path(&self) -> PathBuf {
        self.flights_dir().join("index.json")
    }

    /// 航班号 -> ID 索引
    fn load_number_index(&self) -> HashMap<String, String> {
        if let Ok(data) = fs::read(self.index_path()) {
            if let Ok(map) = serde_json::from_slice::<HashMap<String, String>>(&data) {
                return map;
            }
        }
        HashMap::new()
    }

    fn save_number_index(&self, index: &HashMap<String, String>) -> Result<()> {
        let data = serde_json::to_vec_pretty(index)?;
        fs::write(self.index_path(), data)?;
        Ok(())
    }

    fn persist_flight(&self, flight: &Flight) -> Result<()> {
        let data = serde_json::to_vec_pretty(flight)?;
        std::fs::write(self.flight_path(&flight.id), data)?;
        Ok(())
    }

    fn validate_request(req: &CreateFlightRequest) -> Result<()> {
        if req.flight_number.trim().is_empty() {
            return Err(ServiceError::PolicyViolation("flight number is required".into()));
        }
        if req.airline.trim().is_empty()
            || req.origin.trim().is_empty()
            || req.destination.trim().is_empty()
            || req.duration.trim().is_empty()
        {
            return Err(ServiceError::PolicyViolation(
                "airline, origin, destination and duration are required".into(),
            ));
        }
        if req.seats.is_empty() {
            return Err(ServiceError::PolicyViolation(
                "a flight needs at least one seat".into(),
            ));
        }
        let mut numbers = HashSet::new();
        for seat in &req.seats {
            if seat.number.trim().is_empty() {
                return Err(ServiceError::PolicyViolation("seat number is required".into()));
            }
            if !numbers.insert(seat.number.clone()) {
                return Err(ServiceError::PolicyViolation(format!(
                    "duplicate seat number: {}",
                    seat.number
                )));
            }
        }
        Ok(())
    }

    /// 创建航班，航班号唯一
    #[instrument(skip(self, req))]
    pub async fn create_flight(&self, req: CreateFlightRequest) -> Result<Flight> {
        self.ensure_dirs()?;
        Self::validate_request(&req)?;

        if self.find_by_number(&req.flight_number).await?.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "flight number: {}",
                req.flight_number
            )));
        }

        let flight = Flight {
            id: uuid::Uuid::new_v4().to_string(),
            flight_number: req.flight_number.trim().to_string(),
            airline: req.airline,
            origin: req.origin,
            destination: req.destination,
            departure_at: req.departure_at,
            arrival_at: req.arrival_at,
            duration: req.duration,
            seats: req.seats,
            created_at: Some(Utc::now()),
        };

        self.persist_flight(&flight)?;
        let mut index = self.load_number_index();
        index.insert(flight.flight_number.clone(), flight.id.clone());
        self.save_number_index(&index)?;

        info!(flight_id = %flight.id, flight_number = %flight.flight_number, "created flight");
        Ok(flight)
    }

    /// 批量创建。先整体校验（含批内航班号重复），任何一条不合法都不落盘。
    #[instrument(skip(self, reqs))]
    pub async fn create_flights(&self, reqs: Vec<CreateFlightRequest>) -> Result<Vec<Flight>> {
        self.ensure_dirs()?;
        if reqs.is_empty() {
            return Err(ServiceError::PolicyViolation("no flights supplied".into()));
        }

        let mut batch_numbers = HashSet::new();
        for req in &reqs {
            Self::validate_request(req)?;
            if !batch_numbers.insert(req.flight_number.trim().to_string()) {
                return Err(ServiceError::PolicyViolation(format!(
                    "duplicate flight number in batch: {}",
                    req.flight_number
                )));
            }
            if self.find_by_number(&req.flight_number).await?.is_some() {
                return Err(ServiceError::AlreadyExists(format!(
                    "flight number: {}",
                    req.flight_number
                )));
            }
        }

        let mut flights = Vec::with_capacity(reqs.len());
        for req in reqs {
            flights.push(self.create_flight(req).await?);
        }
        Ok(flights)
    }

    /// 获取航班
    #[instrument(skip(self))]
    pub async fn get_flight(&self, id: &str) -> Result<Flight> {
        let path = self.flight_path(id);
        if !path.exists() {
            return Err(ServiceError::NotFound(format!("flight: {}", id)));
        }
        let data = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// 通过航班号查找（索引优先，失效时扫描修复）
    pub async fn find_by_number(&self, flight_number: &str) -> Result<Option<Flight>> {
        self.ensure_dirs()?;
        let number = flight_number.trim();
        let index = self.load_number_index();

        if let Some(id) = index.get(number) {
            match self.get_flight(id).await {
                Ok(flight) => return Ok(Some(flight)),
                Err(ServiceError::NotFound(_)) => {
                    let mut index = index;
                    index.remove(number);
                    let _ = self.save_number_index(&index);
                }
                Err(e) => return Err(e),
            }
        }

        for flight in self.list_flights().await? {
            if flight.flight_number == number {
                let mut index = self.load_number_index();
                index.insert(number.to_string(), flight.id.clone());
                let _ = self.save_number_index(&index);
                return Ok(Some(flight));
            }
        }
        Ok(None)
    }

    /// 列出全部航班（并发读取所有记录文件）
    pub async fn list_flights(&self) -> Result<Vec<Flight>> {
        self.ensure_dirs()?;
        let dir = self.flights_dir();

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false)
                && path.file_stem().map(|s| s != "index").unwrap_or(true)
            {
                paths.push(path);
            }
        }

        let reads = paths.into_iter().map(tokio::fs::read);
        let mut flights = Vec::new();
        for data in futures::future::join_all(reads).await {
            if let Ok(data) = data {
                if let Ok(flight) = serde_json::from_slice::<Flight>(&data) {
                    flights.push(flight);
                }
            }
        }
        Ok(flights)
    }

    /// 预订一组座位：全部存在、全部可用、舱位相符才提交，
    /// 任何一个不满足就原样返回，不产生半预订。返回座位总价。
    #[instrument(skip(self, requested))]
    pub async fn reserve_seats(
        &self,
        flight_id: &str,
        requested: &[(String, SeatClass)],
    ) -> Result<u64> {
        let _guard = self.seat_guard.lock().await;
        let mut flight = self.get_flight(flight_id).await?;

        let mut total = 0u64;
        let mut indices = Vec::with_capacity(requested.len());
        for (number, class) in requested {
            let idx = flight
                .seats
                .iter()
                .position(|s| &s.number == number)
                .ok_or_else(|| {
                    ServiceError::PolicyViolation(format!("seat {} does not exist", number))
                })?;
            let seat = &flight.seats[idx];
            if seat.state != SeatState::Available {
                return Err(ServiceError::Conflict(format!(
                    "seat {} is not available",
                    number
                )));
            }
            if seat.class != *class {
                return Err(ServiceError::PolicyViolation(format!(
                    "seat {} is not in the requested class",
                    number
                )));
            }
            total += seat.price;
            indices.push(idx);
        }

        for idx in indices {
            flight.seats[idx].state = SeatState::Booked;
        }
        self.persist_flight(&flight)?;

        info!(flight_id = %flight_id, seats = requested.len(), total, "seats reserved");
        Ok(total)
    }

    /// 释放已预订的座位（取消订票时回到可用状态）
    #[instrument(skip(self, numbers))]
    pub async fn release_seats(&self, flight_id: &str, numbers: &[String]) -> Result<()> {
        let _guard = self.seat_guard.lock().await;
        let mut flight = self.get_flight(flight_id).await?;

        for seat in flight.seats.iter_mut() {
            if numbers.contains(&seat.number) && seat.state == SeatState::Booked {
                seat.state = SeatState::Available;
            }
        }
        self.persist_flight(&flight)?;

        info!(flight_id = %flight_id, seats = numbers.len(), "seats released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn seat(number: &str, class: SeatClass, price: u64) -> Seat {
        Seat {
            number: number.to_string(),
            class,
            price,
            state: SeatState::Available,
        }
    }

    fn request(number: &str) -> CreateFlightRequest {
        CreateFlightRequest {
            flight_number: number.to_string(),
            airline: "Skybook Air".to_string(),
            origin: "Delhi".to_string(),
            destination: "Mumbai".to_string(),
            departure_at: Utc.with_ymd_and_hms(2026, 9, 1, 6, 30, 0).unwrap(),
            arrival_at: Utc.with_ymd_and_hms(2026, 9, 1, 8, 45, 0).unwrap(),
            duration: "2h 15m".to_string(),
            seats: vec![
                seat("1A", SeatClass::Business, 9000),
                seat("12A", SeatClass::Economy, 3200),
                seat("12B", SeatClass::Economy, 3200),
            ],
        }
    }

    #[tokio::test]
    async fn create_enforces_unique_flight_numbers() {
        let dir = TempDir::new().unwrap();
        let mgr = FlightManager::new(dir.path());

        mgr.create_flight(request("SB-100")).await.unwrap();
        let err = mgr.create_flight(request("SB-100")).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn bulk_create_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let mgr = FlightManager::new(dir.path());

        let mut bad = request("SB-201");
        bad.seats.clear();
        let err = mgr
            .create_flights(vec![request("SB-200"), bad])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PolicyViolation(_)));
        assert!(mgr.find_by_number("SB-200").await.unwrap().is_none());

        let made = mgr
            .create_flights(vec![request("SB-200"), request("SB-201")])
            .await
            .unwrap();
        assert_eq!(made.len(), 2);
    }

    #[tokio::test]
    async fn reserve_is_atomic_and_checks_state_and_class() {
        let dir = TempDir::new().unwrap();
        let mgr = FlightManager::new(dir.path());
        let flight = mgr.create_flight(request("SB-300")).await.unwrap();

        // 一个座位不合法，另一个也不应被占用
        let err = mgr
            .reserve_seats(
                &flight.id,
                &[
                    ("12A".to_string(), SeatClass::Economy),
                    ("99Z".to_string(), SeatClass::Economy),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PolicyViolation(_)));
        let fresh = mgr.get_flight(&flight.id).await.unwrap();
        assert!(fresh.seats.iter().all(|s| s.state == SeatState::Available));

        // 舱位不符
        let err = mgr
            .reserve_seats(&flight.id, &[("1A".to_string(), SeatClass::Economy)])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PolicyViolation(_)));

        let total = mgr
            .reserve_seats(
                &flight.id,
                &[
                    ("12A".to_string(), SeatClass::Economy),
                    ("12B".to_string(), SeatClass::Economy),
                ],
            )
            .await
            .unwrap();
        assert_eq!(total, 6400);

        // 已占座位再订冲突
        let err = mgr
            .reserve_seats(&flight.id, &[("12A".to_string(), SeatClass::Economy)])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        mgr.release_seats(&flight.id, &["12A".to_string()]).await.unwrap();
        let fresh = mgr.get_flight(&flight.id).await.unwrap();
        let a = fresh.seats.iter().find(|s| s.number == "12A").unwrap();
        let b = fresh.seats.iter().find(|s| s.number == "12B").unwrap();
        assert_eq!(a.state, SeatState::Available);
        assert_eq!(b.state, SeatState::Booked);
    }

    #[tokio::test]
    async fn held_seats_cannot_be_reserved() {
        let dir = TempDir::new().unwrap();
        let mgr = FlightManager::new(dir.path());
        let mut req = request("SB-400");
        req.seats[1].state = SeatState::Held;
        let flight = mgr.create_flight(req).await.unwrap();

        let err = mgr
            .reserve_seats(&flight.id, &[("12A".to_string(), SeatClass::Economy)])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}

//! Movies, studios and the cashier booking flow.
//!
//! Every call goes through [`SessionManager::authorized_request`], so an
//! expired session anywhere in the catalog logs the user out the same way a
//! failed restore does.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Endpoints;
use crate::error::AuthError;
use crate::session::SessionManager;
use crate::transport::{ApiRequest, ApiResponse};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub genre: Option<String>,
    /// Minutes.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Studio {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: u64,
    pub schedule_id: u64,
    #[serde(default)]
    pub seats: Vec<String>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Cashier input for a walk-in sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub schedule_id: u64,
    pub seats: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

/// The API wraps some collections in `{ "data": ... }` and not others.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

fn read<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, AuthError> {
    response
        .json::<Envelope<T>>()
        .map(Envelope::into_inner)
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

pub struct CatalogClient {
    session: Arc<SessionManager>,
    endpoints: Endpoints,
}

impl CatalogClient {
    pub fn new(session: Arc<SessionManager>, endpoints: Endpoints) -> Self {
        Self { session, endpoints }
    }

    pub fn list_movies(&self) -> Result<Vec<Movie>, AuthError> {
        self.get(&self.endpoints.movies)
    }

    pub fn get_movie(&self, id: u64) -> Result<Movie, AuthError> {
        self.get(&format!("{}/{}", self.endpoints.movies, id))
    }

    pub fn list_studios(&self) -> Result<Vec<Studio>, AuthError> {
        self.get(&self.endpoints.studios)
    }

    pub fn list_bookings(&self) -> Result<Vec<Booking>, AuthError> {
        self.get(&self.endpoints.bookings)
    }

    pub fn create_booking(&self, booking: &NewBooking) -> Result<Booking, AuthError> {
        if booking.seats.is_empty() {
            return Err(AuthError::InvalidInput("Pick at least one seat.".to_string()));
        }
        let body =
            serde_json::to_value(booking).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let response = self
            .session
            .authorized_request(ApiRequest::post(&self.endpoints.bookings, body))?;
        read(&response)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let response = self.session.authorized_request(ApiRequest::get(path))?;
        read(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use crate::storage::{save_session, MemoryStorage, SessionStorage};
    use crate::strategy::BearerStrategy;
    use crate::test_support::{make_user, ScriptedTransport};
    use crate::transport::Method;
    use serde_json::json;

    fn client() -> (CatalogClient, Arc<ScriptedTransport>, Arc<MemoryStorage>) {
        let transport = Arc::new(ScriptedTransport::new());
        let storage = Arc::new(MemoryStorage::new());
        save_session(
            storage.as_ref(),
            &make_user(2, "kasir@bioskop.test", "cashier"),
            Some("2|tok"),
        )
        .unwrap();

        let session = Arc::new(SessionManager::new(
            Box::new(BearerStrategy::new(Endpoints::default())),
            transport.clone(),
            storage.clone(),
        ));
        (
            CatalogClient::new(session, Endpoints::default()),
            transport,
            storage,
        )
    }

    #[test]
    fn lists_bare_movie_array() {
        let (client, transport, _) = client();
        transport.respond(
            Method::Get,
            "/api/movies",
            200,
            json!([
                {"id": 1, "title": "Laskar Pelangi", "genre": "Drama", "duration": 125},
                {"id": 2, "title": "Pengabdi Setan", "rating": "D17"}
            ]),
        );

        let movies = client.list_movies().unwrap();
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].duration, Some(125));
        assert_eq!(movies[1].extra["rating"], "D17");
        assert_eq!(
            transport.requests()[0].header_value("Authorization"),
            Some("Bearer 2|tok")
        );
    }

    #[test]
    fn unwraps_data_envelope() {
        let (client, transport, _) = client();
        transport.respond(
            Method::Get,
            "/api/studios",
            200,
            json!({"data": [{"id": 1, "name": "Studio 1", "capacity": 120}]}),
        );

        let studios = client.list_studios().unwrap();
        assert_eq!(studios[0].name, "Studio 1");
        assert_eq!(studios[0].capacity, Some(120));
    }

    #[test]
    fn get_movie_by_id() {
        let (client, transport, _) = client();
        transport.respond(
            Method::Get,
            "/api/movies/7",
            200,
            json!({"data": {"id": 7, "title": "Gundala"}}),
        );

        assert_eq!(client.get_movie(7).unwrap().title, "Gundala");
    }

    #[test]
    fn create_booking_posts_payload() {
        let (client, transport, _) = client();
        transport.respond(
            Method::Post,
            "/api/bookings",
            201,
            json!({"data": {
                "id": 55, "schedule_id": 3, "seats": ["A1", "A2"],
                "total_price": 90000.0, "status": "paid",
                "created_at": "2024-06-01T12:00:00Z"
            }}),
        );

        let booking = client
            .create_booking(&NewBooking {
                schedule_id: 3,
                seats: vec!["A1".to_string(), "A2".to_string()],
                customer_name: Some("Walk-in".to_string()),
                payment_method: None,
            })
            .unwrap();

        assert_eq!(booking.id, 55);
        assert_eq!(booking.status.as_deref(), Some("paid"));
        assert!(booking.created_at.is_some());

        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body["seats"], json!(["A1", "A2"]));
        assert!(body.get("payment_method").is_none());
    }

    #[test]
    fn booking_without_seats_is_rejected_locally() {
        let (client, transport, _) = client();
        let err = client
            .create_booking(&NewBooking {
                schedule_id: 3,
                seats: vec![],
                customer_name: None,
                payment_method: None,
            })
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidInput(_)));
        assert_eq!(err.user_message(), "Pick at least one seat.");
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn expired_session_logs_out() {
        let (client, transport, storage) = client();
        transport.respond(Method::Get, "/api/bookings", 401, json!({"message": "Unauthenticated."}));

        let err = client.list_bookings().unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
        assert_eq!(client.session.status(), SessionStatus::Unauthenticated);
        assert!(storage.get_item("token").is_none());
    }

    #[test]
    fn malformed_payload_is_invalid_response() {
        let (client, transport, _) = client();
        transport.respond(Method::Get, "/api/movies", 200, json!({"movies": "nope"}));

        assert!(matches!(
            client.list_movies(),
            Err(AuthError::InvalidResponse(_))
        ));
    }
}

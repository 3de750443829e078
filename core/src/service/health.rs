use log::error;
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::config::{SERVICE_NAME, SERVICE_VERSION};
use crate::service::TrackerService;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Fail,
}

impl From<bool> for CheckStatus {
    fn from(value: bool) -> Self {
        if value {
            CheckStatus::Ok
        } else {
            CheckStatus::Fail
        }
    }
}

/// Liveness payload. Never touches the database.
#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub fn liveness() -> Liveness {
    Liveness {
        status: "healthy",
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
    }
}

#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    pub status: CheckStatus,
    pub db: CheckStatus,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        matches!(self.status, CheckStatus::Ok)
    }
}

impl TrackerService {
    pub async fn readiness(&self) -> ReadinessReport {
        let db_status = self.check_db().await;
        ReadinessReport {
            status: (db_status == CheckStatus::Ok).into(),
            db: db_status,
        }
    }

    async fn check_db(&self) -> CheckStatus {
        let db = self.persist_ctx().db.as_ref();
        let stmt = sea_orm::Statement::from_string(db.get_database_backend(), "SELECT NOW()");
        match db.query_one(stmt).await {
            Ok(_) => CheckStatus::Ok,
            Err(e) => {
                error!("DB health check failed: {e}");
                CheckStatus::Fail
            }
        }
    }
}

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone)]
pub struct RestoreBackupRequest {
    pub filename: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct BackupCreated {
    pub filename: String,
}

pub mod backup_models;
pub mod entry_models;
pub mod widget_models;

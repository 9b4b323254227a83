pub mod backup_routes;
pub mod entry_routes;
pub mod group_routes;
pub mod register_routes;
pub mod settings_routes;
pub mod widget_routes;

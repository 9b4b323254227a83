//! SeaORM entities for the tracker tables.

pub mod service_entry;
pub mod service_group;
pub mod widget;
pub mod widget_value;

pub mod prelude {
    pub use super::service_entry::ActiveModel as ServiceEntryActiveModel;
    pub use super::service_entry::Column as ServiceEntryColumn;
    pub use super::service_entry::Entity as ServiceEntry;
    pub use super::service_entry::Model as ServiceEntryModel;

    pub use super::service_group::ActiveModel as ServiceGroupActiveModel;
    pub use super::service_group::Column as ServiceGroupColumn;
    pub use super::service_group::Entity as ServiceGroup;
    pub use super::service_group::Model as ServiceGroupModel;

    pub use super::widget::ActiveModel as WidgetActiveModel;
    pub use super::widget::Column as WidgetColumn;
    pub use super::widget::Entity as Widget;
    pub use super::widget::Model as WidgetModel;

    pub use super::widget_value::ActiveModel as WidgetValueActiveModel;
    pub use super::widget_value::Column as WidgetValueColumn;
    pub use super::widget_value::Entity as WidgetValue;
    pub use super::widget_value::Model as WidgetValueModel;
}

//! The table of resource and data source types the provider serves.

use crate::config::ProviderConfig;
use crate::resources::group::Group;
use crate::resources::repositories::Repositories;
use crate::resources::repository::LocalGradleRepository;
use crate::resources::security_policy::{PasswordExpirationPolicy, UserLockPolicy};
use crate::resources::user::User;
use crate::resources::{DataSource, Resource};
use crate::schema::ProviderSchema;

/// Builds a resource handler.
pub type ResourceConstructor = fn() -> Box<dyn Resource>;

/// Builds a data source handler.
pub type DataSourceConstructor = fn() -> Box<dyn DataSource>;

/// Every managed resource type.
pub const RESOURCES: &[ResourceConstructor] = &[
    LocalGradleRepository::boxed,
    User::boxed,
    Group::boxed,
    UserLockPolicy::boxed,
    PasswordExpirationPolicy::boxed,
];

/// Every data source type.
pub const DATA_SOURCES: &[DataSourceConstructor] = &[Repositories::boxed];

/// Look up a resource handler by type name.
pub fn resource(type_name: &str) -> Option<Box<dyn Resource>> {
    RESOURCES
        .iter()
        .map(|construct| construct())
        .find(|resource| resource.type_name() == type_name)
}

/// Look up a data source handler by type name.
pub fn data_source(type_name: &str) -> Option<Box<dyn DataSource>> {
    DATA_SOURCES
        .iter()
        .map(|construct| construct())
        .find(|data_source| data_source.type_name() == type_name)
}

/// The full provider schema: provider block, resources and data sources.
pub fn provider_schema() -> ProviderSchema {
    let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
    let schema = RESOURCES.iter().map(|construct| construct()).fold(schema, |schema, resource| {
        schema.with_resource(resource.type_name(), resource.schema())
    });
    DATA_SOURCES
        .iter()
        .map(|construct| construct())
        .fold(schema, |schema, data_source| {
            schema.with_data_source(data_source.type_name(), data_source.schema())
        })
}

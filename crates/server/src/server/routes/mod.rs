//! Feature route groups.
//!
//! Each group is built with the [`DataAccess`] façade and returns a
//! state-free [`Router`] that the pipeline nests under its prefix.

mod auth;
mod collection;

pub use auth::AuthRoutes;
pub use collection::CollectionRoutes;

use axum::Router;

use crate::data::DataAccess;

/// A feature router mounted under a fixed path prefix.
pub trait RouteGroup: Send {
    /// Mount point, e.g. `/api/users`.
    fn prefix(&self) -> &'static str;

    /// Routes relative to [`RouteGroup::prefix`].
    fn router(&self) -> Router;
}

/// The feature route groups, in mount order.
pub fn collaborators(db: &DataAccess) -> Vec<Box<dyn RouteGroup>> {
    vec![
        Box::new(AuthRoutes::new(db.clone())),
        Box::new(CollectionRoutes::new("/api/users", "users", db.clone())),
        Box::new(CollectionRoutes::new("/api/sleep", "sleepRecords", db.clone())),
        Box::new(CollectionRoutes::new("/api/competitions", "competitions", db.clone())),
        Box::new(CollectionRoutes::new("/api/notifications", "notifications", db.clone())),
        Box::new(CollectionRoutes::new("/api/invitations", "invitations", db.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn every_group_has_a_distinct_prefix() {
        let db = DataAccess::new(MemoryStore::new().handle());
        let groups = collaborators(&db);
        let mut prefixes: Vec<_> = groups.iter().map(|g| g.prefix()).collect();
        assert_eq!(prefixes.len(), 6);
        prefixes.sort_unstable();
        prefixes.dedup();
        assert_eq!(prefixes.len(), 6);
        assert!(prefixes.iter().all(|p| p.starts_with("/api/")));
    }
}

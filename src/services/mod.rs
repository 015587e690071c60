//! Business logic services

pub mod authors;
pub mod availability;
pub mod catalog;
pub mod ledger;
pub mod users;

use crate::repository::Repository;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub authors: authors::AuthorsService,
    pub catalog: catalog::CatalogService,
    pub availability: availability::AvailabilityProjector,
    pub ledger: ledger::LendingLedger,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services over the given stores
    pub fn new(repository: Repository) -> Self {
        Self {
            authors: authors::AuthorsService::new(repository.authors.clone()),
            catalog: catalog::CatalogService::new(repository.authors.clone(), repository.books.clone()),
            availability: availability::AvailabilityProjector::new(repository.books.clone()),
            ledger: ledger::LendingLedger::new(
                repository.books.clone(),
                repository.users.clone(),
                repository.ledger.clone(),
            ),
            users: users::UsersService::new(repository.users),
        }
    }
}

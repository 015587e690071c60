mod ledger;
mod postgres;
mod router;

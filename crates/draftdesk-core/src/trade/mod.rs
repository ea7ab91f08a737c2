// Trade machine: cap rules, salary-matching validation, proposals and
// transactional application against the asset ledger.

pub mod desk;
pub mod proposal;
pub mod rules;
pub mod validator;

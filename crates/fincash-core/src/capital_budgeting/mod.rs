pub mod investment;

pub mod inspect;
pub mod proxy;

pub mod mapper;
pub mod network_config;
pub mod sacn;

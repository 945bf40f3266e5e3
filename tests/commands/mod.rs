mod config;
mod fix;

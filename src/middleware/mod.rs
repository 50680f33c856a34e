pub mod trigger_auth;

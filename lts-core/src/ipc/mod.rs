//! Serializable types the host publishes to whoever is listening (the app
//! logs them; a GUI could forward them unchanged).

pub mod events;

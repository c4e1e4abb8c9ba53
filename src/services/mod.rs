mod sound_service_client;
pub(crate) use sound_service_client::*;

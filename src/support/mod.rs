pub mod clock;
pub mod ocpp_frame;
pub mod pem;
pub mod shutdown;

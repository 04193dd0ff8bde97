#![no_std]

extern crate alloc;

pub mod imu;
pub mod link;
pub mod status;

#[macro_export]
macro_rules! mpsc_channel {
    ($t:ty, $size:expr) => {{
        use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
        use embassy_sync::channel::Channel;

        static CHANNEL: Channel<CriticalSectionRawMutex, $t, $size> = Channel::new();

        &CHANNEL
    }};
}

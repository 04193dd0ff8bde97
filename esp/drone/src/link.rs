//! ESP-NOW link to the handheld remote.

use common_messages::{DroneResponse, RemoteRequest};
use defmt::{debug, error, info, warn};
use embassy_futures::join::join3;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{Duration, Ticker};
use esp_hal::peripherals::WIFI;
use esp_radio::esp_now::{
    BROADCAST_ADDRESS, EspNowError, EspNowManager, EspNowReceiver, EspNowSender,
    EspNowWifiInterface, PeerInfo,
};
use esp_radio::wifi::{WifiError, WifiMode};

/// Shared with the remote.
const CHANNEL: u8 = 11;

pub const REQUESTS_LEN: usize = 16;
pub const RESPONSES_LEN: usize = 16;

pub type Requests = Sender<'static, CriticalSectionRawMutex, RemoteRequest, REQUESTS_LEN>;
pub type Responses = Receiver<'static, CriticalSectionRawMutex, DroneResponse, RESPONSES_LEN>;

#[derive(thiserror::Error, Debug, defmt::Format)]
pub enum LinkError {
    #[error("Radio initialization failed: {0:?}")]
    Radio(esp_radio::InitializationError),

    #[error("Wifi error: {0:?}")]
    Wifi(WifiError),

    #[error("ESP-NOW error: {0:?}")]
    EspNow(EspNowError),
}

/// Brings up the radio and then shuttles messages until the end of time.
/// Only returns when the radio cannot be started.
pub async fn communicate(
    wifi: WIFI<'_>,
    outgoing: Responses,
    incoming: Requests,
) -> Result<(), LinkError> {
    let radio_init = esp_radio::init().map_err(LinkError::Radio)?;

    let (mut wifi_controller, interfaces) =
        esp_radio::wifi::new(&radio_init, wifi, Default::default()).map_err(LinkError::Wifi)?;
    wifi_controller
        .set_mode(WifiMode::Sta)
        .map_err(LinkError::Wifi)?;
    wifi_controller.start().map_err(LinkError::Wifi)?;

    let esp_now = interfaces.esp_now;
    esp_now.set_channel(CHANNEL).map_err(LinkError::EspNow)?;

    info!(
        "esp-now version {}",
        esp_now.version().map_err(LinkError::EspNow)?
    );

    let (manager, esp_now_sender, esp_now_receiver) = esp_now.split();

    let broadcast_fut = broadcast(esp_now_sender, outgoing);
    let receive_fut = receive(&manager, esp_now_receiver, incoming);
    let fetch_peers_fut = fetch_peers(&manager);

    join3(broadcast_fut, receive_fut, fetch_peers_fut).await;
    Ok(())
}

async fn broadcast(mut sender: EspNowSender<'_>, messages: Responses) {
    loop {
        let message = messages.receive().await;
        let bytes = match wincode::serialize(&message) {
            Ok(bytes) => bytes,
            Err(_) => {
                error!("Unable to serialize {}", message);
                continue;
            }
        };

        match sender.send_async(&BROADCAST_ADDRESS, &bytes).await {
            Ok(_) => debug!("Sent {}", message),
            Err(err) => error!("Error while sending: {}", err),
        }
    }
}

async fn receive(
    manager: &EspNowManager<'_>,
    mut receiver: EspNowReceiver<'_>,
    messages: Requests,
) {
    loop {
        let received = receiver.receive_async().await;
        match wincode::deserialize::<RemoteRequest>(received.data()) {
            Ok(request) => {
                debug!("Received {}", request);
                messages.send(request).await;
            }
            Err(_) => {
                warn!("Dropped malformed frame from {:?}", received.info.src_address);
                continue;
            }
        }

        if received.info.dst_address == BROADCAST_ADDRESS
            && !manager.peer_exists(&received.info.src_address)
        {
            let added = manager.add_peer(PeerInfo {
                interface: EspNowWifiInterface::Sta,
                peer_address: received.info.src_address,
                lmk: None,
                channel: None,
                encrypt: false,
            });
            match added {
                Ok(()) => info!("Added peer {:?}", received.info.src_address),
                Err(err) => warn!("Unable to add peer: {}", err),
            }
        }
    }
}

async fn fetch_peers(manager: &EspNowManager<'_>) {
    let mut ticker = Ticker::every(Duration::from_millis(500));
    loop {
        ticker.next().await;

        if manager.fetch_peer(false).is_err() {
            _ = manager.fetch_peer(true);
        }
    }
}

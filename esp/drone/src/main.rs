#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

extern crate alloc;

use common_messages::{DroneResponse, RemoteRequest};
use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Duration, Instant, Ticker};
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::peripherals::{Peripherals, SW_INTERRUPT, TIMG0, WIFI};
use esp_hal::timer::timg::TimerGroup;
use flight_core::rc::{
    Absent, ArmingControl, CHANNEL_THROTTLE, RcControls, RcModes, StickChannels, StickPosition,
};
use flight_core::{GyroConfig, GyroPipeline, RcControlsConfig};

use drone::imu::{self, Lsm6ds3};
use drone::link::{self, REQUESTS_LEN, RESPONSES_LEN, Requests, Responses};
use drone::mpsc_channel;
use drone::status::{ArmingInputs, FlightState, ResponseSender};

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

const RC_INTERVAL: Duration = Duration::from_millis(20);
const STATUS_INTERVAL: Duration = Duration::from_millis(100);
/// Without a request for this long the link counts as lost.
const LINK_TIMEOUT: Duration = Duration::from_millis(500);

/// Throttle low, everything else centered.
const FAILSAFE_STICKS: StickChannels = [0.0, 0.0, 0.0, -500.0];

fn gyro_config() -> GyroConfig {
    GyroConfig {
        sample_rate_hz: imu::SAMPLE_RATE_HZ,
        filter_rate_hz: imu::SAMPLE_RATE_HZ / 2,
        target_rate_hz: imu::SAMPLE_RATE_HZ / 2,
        range_dps: imu::RANGE_DPS,
        ..GyroConfig::default()
    }
}

fn rc_config() -> RcControlsConfig {
    RcControlsConfig {
        stick_arming_enabled: true,
        arm_switch_configured: false,
        gyro_cal_on_first_arm: true,
        motor_stop: true,
        ..RcControlsConfig::default()
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    let peripherals = init_esp();
    init_rtos(peripherals.TIMG0, peripherals.SW_INTERRUPT);
    info!("Embassy initialized!");

    // Initialize connection to remote controller
    let requests = mpsc_channel!(RemoteRequest, REQUESTS_LEN);
    let responses = mpsc_channel!(DroneResponse, RESPONSES_LEN);
    spawner.must_spawn(esp_now_communicate(
        peripherals.WIFI,
        responses.receiver(),
        requests.sender(),
    ));

    let imu = {
        info!("IMU init...");

        let poci = peripherals.GPIO0;
        let imu_cs = peripherals.GPIO1;
        let pico = peripherals.GPIO2;
        let sck = peripherals.GPIO3;

        let configured = Lsm6ds3::new(peripherals.SPI2, sck, pico, poci, imu_cs)
            .and_then(|mut imu| imu.configure().map(|()| imu));
        match configured {
            Ok(imu) => imu,
            Err(e) => defmt::panic!("IMU unavailable: {}", e),
        }
    };
    info!("IMU initialized!");

    let mut flight = match FlightLoop::new(responses.sender()) {
        Some(flight) => flight,
        None => defmt::panic!("flight loop configuration rejected"),
    };
    flight.run(imu, requests.receiver()).await
}

#[embassy_executor::task]
async fn esp_now_communicate(wifi: WIFI<'static>, outgoing: Responses, incoming: Requests) {
    if let Err(e) = link::communicate(wifi, outgoing, incoming).await {
        error!("remote link down: {}", e);
    }
}

/// Gyro conditioning at the sample rate and stick handling at the RC rate,
/// interleaved on one task.
struct FlightLoop {
    pipeline: GyroPipeline,
    rc: RcControls,
    state: FlightState,
    sticks: StickChannels,
    modes: RcModes,
    remote_failsafe: bool,
    link_up: bool,
    last_request: Option<Instant>,
    last_rc: Instant,
    last_status: Instant,
}

impl FlightLoop {
    fn new(responses: ResponseSender) -> Option<Self> {
        let pipeline = match GyroPipeline::new(&gyro_config(), 1) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!("gyro configuration rejected: {}", e);
                return None;
            }
        };
        info!("gyro timing: {}", pipeline.timing());

        let rc_config = rc_config();
        let now = Instant::now();
        Some(Self {
            pipeline,
            rc: RcControls::new(&rc_config),
            state: FlightState::new(&rc_config, responses),
            sticks: FAILSAFE_STICKS,
            modes: RcModes::default(),
            remote_failsafe: false,
            link_up: false,
            last_request: None,
            last_rc: now,
            last_status: now,
        })
    }

    async fn run(
        &mut self,
        mut imu: Lsm6ds3,
        requests: Receiver<'static, CriticalSectionRawMutex, RemoteRequest, REQUESTS_LEN>,
    ) -> ! {
        let looptime = Duration::from_micros(self.pipeline.timing().sample_looptime_us as u64);
        let mut ticker = Ticker::every(looptime);

        loop {
            ticker.next().await;

            while let Ok(request) = requests.try_receive() {
                self.handle_request(request);
            }

            self.gyro_tick(&mut imu);

            let now = Instant::now();
            if now - self.last_rc >= RC_INTERVAL {
                self.rc_tick(now);
            }
            if now - self.last_status >= STATUS_INTERVAL {
                self.pipeline.read_temperature(&mut imu);
                self.publish_status(now);
            }
        }
    }

    fn handle_request(&mut self, request: RemoteRequest) {
        self.last_request = Some(Instant::now());

        match request {
            RemoteRequest::Ping => self.state.send(DroneResponse::Pong),
            RemoteRequest::Sticks {
                roll,
                pitch,
                yaw,
                throttle,
            } => self.sticks = [roll, pitch, yaw, throttle],
            RemoteRequest::ArmSwitch(on) => self.modes.arm_switch = on,
            RemoteRequest::Modes {
                self_leveling,
                stick_commands_disabled,
            } => {
                self.modes.self_leveling = self_leveling;
                self.modes.stick_commands_disabled = stick_commands_disabled;
            }
            RemoteRequest::Failsafe(active) => {
                if active != self.remote_failsafe {
                    warn!("remote failsafe {}", active);
                }
                self.remote_failsafe = active;
            }
            _ => warn!("unhandled request {}", request),
        }
    }

    fn gyro_tick(&mut self, imu: &mut Lsm6ds3) {
        if let Some(first_arming) = self.state.take_calibration_request() {
            self.pipeline
                .start_calibration(first_arming, self.state.is_armed());
        }
        self.pipeline.update(imu);
    }

    fn rc_tick(&mut self, now: Instant) {
        let elapsed_ms = (now - self.last_rc).as_millis() as u32;
        self.last_rc = now;

        let link_up = self
            .last_request
            .is_some_and(|last| now - last < LINK_TIMEOUT);
        if link_up != self.link_up {
            info!("remote link {}", if link_up { "up" } else { "lost" });
            self.link_up = link_up;
            if !link_up {
                self.sticks = FAILSAFE_STICKS;
            }
        }

        self.modes.rx_signal = link_up;
        self.modes.failsafe_active = !link_up || self.remote_failsafe;

        self.state.update_arming_disable_flags(ArmingInputs {
            gyro_missing: self.pipeline.live_device_count() == 0,
            gyro_calibrating: !self.pipeline.is_calibration_complete(),
            link_up,
            remote_failsafe: self.remote_failsafe,
            throttle_low: StickPosition::from_deflection(self.sticks[CHANNEL_THROTTLE])
                == StickPosition::Low,
        });

        self.rc.process_stick_positions(
            &self.sticks,
            elapsed_ms,
            &self.modes,
            &mut self.state,
            &mut Absent,
        );
    }

    fn publish_status(&mut self, now: Instant) {
        self.last_status = now;
        let rates = self
            .pipeline
            .accumulation_average()
            .unwrap_or(*self.pipeline.filtered());
        self.state.send(DroneResponse::GyroStatus {
            rates,
            overflow: self.pipeline.overflow_detected(),
            calibrating: !self.pipeline.is_calibration_complete(),
            temperature: self.pipeline.temperature(),
        });
    }
}

fn init_esp() -> Peripherals {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    peripherals
}

fn init_rtos(timer_group_0: TIMG0<'static>, sw_interrupt: SW_INTERRUPT<'static>) {
    let timg0 = TimerGroup::new(timer_group_0);
    let sw_interrupt = esp_hal::interrupt::software::SoftwareInterruptControl::new(sw_interrupt);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);
}

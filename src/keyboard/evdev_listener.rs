//! Evdev-based keyboard interceptor for Linux
//!
//! Every keyboard under `/dev/input` is grabbed exclusively, so nothing else
//! sees its events. Events that survive the filter are written to a uinput
//! virtual keyboard, which the rest of the desktop reads instead.
//!
//! A grab also cuts the desktop off from the keyboards' LEDs, so the lock
//! LEDs are driven from here while the grab lasts. The state starts from the
//! LEDs as found at grab time and follows the lock keys that are forwarded.

use super::relay::{KeyValue, LockLeds, RepeatGate, LED_CAPSL, LED_NUML, LED_SCROLLL};
use super::{InterceptError, KeyCode, KeyEvent, KeyInterceptor};
use crate::debounce::Verdict;
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key, LedType};
use nix::libc;
use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant, UNIX_EPOCH};

/// Name of the uinput device that carries passed events
pub const VIRTUAL_DEVICE_NAME: &str = "keyboard-debounce virtual keyboard";

const SYN_REPORT: u16 = 0;

const POLL_TIMEOUT_MS: libc::c_int = 100;
const RELEASE_WAIT: Duration = Duration::from_secs(2);

// EVIOCSCLOCKID takes a pointer to the clock id.
nix::ioctl_write_ptr!(eviocsclockid, b'E', 0xa0, libc::c_int);

/// Stamp this device's events with `CLOCK_MONOTONIC` instead of wall time
fn use_monotonic_clock(device: &Device) -> nix::Result<()> {
    let clock: libc::c_int = libc::CLOCK_MONOTONIC;
    unsafe { eviocsclockid(device.as_raw_fd(), &clock) }?;
    Ok(())
}

fn monotonic_now() -> io::Result<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
}

/// Pairs one `CLOCK_MONOTONIC` reading with an `Instant` so kernel event
/// stamps can be turned into `Instant`s
#[derive(Debug, Clone, Copy)]
struct ClockAnchor {
    instant: Instant,
    monotonic: Duration,
}

impl ClockAnchor {
    fn now() -> io::Result<Self> {
        let monotonic = monotonic_now()?;
        Ok(Self {
            instant: Instant::now(),
            monotonic,
        })
    }

    fn to_instant(&self, stamp: Duration) -> Instant {
        if stamp >= self.monotonic {
            self.instant + (stamp - self.monotonic)
        } else {
            self.instant
                .checked_sub(self.monotonic - stamp)
                .unwrap_or(self.instant)
        }
    }
}

/// A device is a keyboard when it has letters and Enter
fn is_keyboard(device: &Device) -> bool {
    device.supported_keys().is_some_and(|keys| {
        keys.contains(Key::KEY_A) && keys.contains(Key::KEY_Z) && keys.contains(Key::KEY_ENTER)
    })
}

/// One grabbed physical keyboard
struct Keyboard {
    path: PathBuf,
    device: Device,
    /// Events carry `CLOCK_MONOTONIC` stamps
    monotonic: bool,
}

impl Keyboard {
    fn open(path: PathBuf, device: Device) -> Self {
        let monotonic = match use_monotonic_clock(&device) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Cannot switch {} to the monotonic clock ({}), timing events on arrival",
                    path.display(),
                    e
                );
                false
            }
        };
        Self {
            path,
            device,
            monotonic,
        }
    }
}

/// Find and open all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<(PathBuf, Device)>, InterceptError> {
    let input_dir = Path::new("/dev/input");
    if !input_dir.exists() {
        return Err(InterceptError::EnumerationFailed(
            "/dev/input does not exist".to_string(),
        ));
    }

    let mut keyboards = Vec::new();
    let mut denied = 0usize;

    for entry in fs::read_dir(input_dir)?.flatten() {
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("event"));
        if !is_event_node {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                if device.name() == Some(VIRTUAL_DEVICE_NAME) {
                    continue;
                }
                if is_keyboard(&device) {
                    log::debug!(
                        "Found keyboard {} ({})",
                        path.display(),
                        device.name().unwrap_or("unnamed")
                    );
                    keyboards.push((path, device));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                denied += 1;
            }
            Err(e) => {
                log::debug!("Failed to open {}: {}", path.display(), e);
            }
        }
    }

    if keyboards.is_empty() {
        if denied > 0 {
            return Err(InterceptError::PermissionDenied(
                "Cannot access any keyboard devices. Try running with sudo or add user to 'input' group.".to_string(),
            ));
        }
        return Err(InterceptError::NoDevices);
    }

    keyboards.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyboards)
}

/// Build a virtual keyboard that can emit every key the real ones have
fn create_virtual_keyboard(keyboards: &[Keyboard]) -> Result<VirtualDevice, InterceptError> {
    let mut keys = AttributeSet::<Key>::new();
    for keyboard in keyboards {
        if let Some(supported) = keyboard.device.supported_keys() {
            for key in supported.iter() {
                keys.insert(key);
            }
        }
    }

    VirtualDeviceBuilder::new()
        .and_then(|builder| builder.name(VIRTUAL_DEVICE_NAME).with_keys(&keys))
        .and_then(|builder| builder.build())
        .map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                InterceptError::PermissionDenied(
                    "Cannot open /dev/uinput. Try running with sudo or add a udev rule for uinput."
                        .to_string(),
                )
            } else {
                InterceptError::VirtualDevice(e)
            }
        })
}

/// Wait (bounded) until no key is physically held.
///
/// Grabbing while a key is down would hide its release from whoever saw the
/// press, typically the Enter that started this program.
fn wait_for_keys_released(keyboards: &[Keyboard], timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        let any_held = keyboards.iter().any(|keyboard| {
            keyboard
                .device
                .get_key_state()
                .map(|state| state.iter().next().is_some())
                .unwrap_or(false)
        });
        if !any_held {
            return;
        }
        if Instant::now() >= deadline {
            log::warn!("Keys still held after {:?}, grabbing anyway", timeout);
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Lock LEDs as currently lit on the first keyboard that reports them
fn current_leds(keyboards: &[Keyboard]) -> LockLeds {
    keyboards
        .iter()
        .find_map(|keyboard| keyboard.device.get_led_state().ok())
        .map(|lit| LockLeds {
            num: lit.contains(LedType::LED_NUML),
            caps: lit.contains(LedType::LED_CAPSL),
            scroll: lit.contains(LedType::LED_SCROLLL),
        })
        .unwrap_or_default()
}

/// Evdev interceptor: grabbed keyboards in, virtual keyboard out
pub struct EvdevInterceptor {
    keyboards: Vec<Keyboard>,
    output: VirtualDevice,
    clock: ClockAnchor,
    repeats: RepeatGate,
    leds: LockLeds,
    grabbed: bool,
}

impl EvdevInterceptor {
    /// Open all keyboards and the virtual output device
    pub fn new() -> Result<Self, InterceptError> {
        let keyboards: Vec<Keyboard> = find_keyboard_devices()?
            .into_iter()
            .map(|(path, device)| Keyboard::open(path, device))
            .collect();
        let output = create_virtual_keyboard(&keyboards)?;
        log::info!("Created {}", VIRTUAL_DEVICE_NAME);

        Ok(Self {
            keyboards,
            output,
            clock: ClockAnchor::now()?,
            repeats: RepeatGate::new(),
            leds: LockLeds::default(),
            grabbed: false,
        })
    }

    /// Get the number of intercepted devices
    pub fn device_count(&self) -> usize {
        self.keyboards.len()
    }

    fn grab_all(&mut self) -> Result<(), InterceptError> {
        wait_for_keys_released(&self.keyboards, RELEASE_WAIT);
        self.leds = current_leds(&self.keyboards);

        let mut kept = Vec::new();
        for mut keyboard in self.keyboards.drain(..) {
            match keyboard.device.grab() {
                Ok(()) => {
                    log::info!("Grabbed {}", keyboard.path.display());
                    kept.push(keyboard);
                }
                Err(e) => log::warn!("Failed to grab {}: {}", keyboard.path.display(), e),
            }
        }
        self.keyboards = kept;

        if self.keyboards.is_empty() {
            return Err(InterceptError::PermissionDenied(
                "Could not grab any keyboard. Is another program holding it?".to_string(),
            ));
        }
        self.grabbed = true;
        let all = self.leds.states();
        self.send_leds(&all);
        Ok(())
    }

    fn ungrab_all(&mut self) {
        if !self.grabbed {
            return;
        }
        for keyboard in &mut self.keyboards {
            if let Err(e) = keyboard.device.ungrab() {
                log::warn!("Failed to release {}: {}", keyboard.path.display(), e);
            }
        }
        self.grabbed = false;
    }

    /// Write LED states to every grabbed keyboard
    fn send_leds(&mut self, leds: &[(u16, bool)]) {
        let events: Vec<InputEvent> = leds
            .iter()
            .map(|&(led, on)| InputEvent::new(EventType::LED, led, on as i32))
            .collect();
        for keyboard in &mut self.keyboards {
            if let Err(e) = keyboard.device.send_events(&events) {
                log::debug!("Failed to set LEDs on {}: {}", keyboard.path.display(), e);
            }
        }
    }

    /// Route one key event through the handler; true if it should be forwarded
    fn route_key(
        &mut self,
        code: u16,
        value: i32,
        at: Instant,
        handler: &mut dyn FnMut(&KeyEvent) -> Verdict,
    ) -> bool {
        let key = KeyCode::new(code);
        let Some(value) = KeyValue::from_raw(value) else {
            return true;
        };
        let verdict = match value {
            KeyValue::Press => handler(&KeyEvent::press(key, at)),
            KeyValue::Release => handler(&KeyEvent::release(key, at)),
            KeyValue::Repeat => Verdict::Pass,
        };
        let forward = self.repeats.forward(key, value, verdict);

        if forward && value == KeyValue::Press {
            if let Some(led) = self.leds.on_forwarded_press(key) {
                self.send_leds(&[led]);
            }
        }
        forward
    }

    /// When an event happened, from its kernel stamp where possible
    fn event_time(&self, monotonic: bool, ev: &InputEvent) -> Instant {
        if monotonic {
            if let Ok(stamp) = ev.timestamp().duration_since(UNIX_EPOCH) {
                return self.clock.to_instant(stamp);
            }
        }
        Instant::now()
    }

    fn forward(&mut self, frame: &mut Vec<InputEvent>) -> Result<(), InterceptError> {
        if frame.is_empty() {
            return Ok(());
        }
        self.output.emit(frame.as_slice())?;
        frame.clear();
        Ok(())
    }

    fn pump(
        &mut self,
        running: &AtomicBool,
        handler: &mut dyn FnMut(&KeyEvent) -> Verdict,
    ) -> Result<(), InterceptError> {
        let mut poll_fds: Vec<libc::pollfd> = self
            .keyboards
            .iter()
            .map(|k| libc::pollfd {
                fd: k.device.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        let mut live = poll_fds.len();
        let mut frame: Vec<InputEvent> = Vec::with_capacity(8);

        while running.load(Ordering::SeqCst) {
            let ret = unsafe {
                libc::poll(
                    poll_fds.as_mut_ptr(),
                    poll_fds.len() as libc::nfds_t,
                    POLL_TIMEOUT_MS,
                )
            };

            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(InterceptError::Io(err));
            }
            if ret == 0 {
                continue;
            }

            for i in 0..poll_fds.len() {
                let revents = poll_fds[i].revents;
                if poll_fds[i].fd < 0 || revents == 0 {
                    continue;
                }

                let fetched: Result<Vec<InputEvent>, io::Error> = self.keyboards[i]
                    .device
                    .fetch_events()
                    .map(|events| events.collect());
                let events = match fetched {
                    Ok(events) => events,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(e) => {
                        log::warn!("Lost keyboard {}: {}", self.keyboards[i].path.display(), e);
                        // Negative fds are ignored by poll(2).
                        poll_fds[i].fd = -1;
                        live -= 1;
                        if live == 0 {
                            return Err(InterceptError::NoDevices);
                        }
                        continue;
                    }
                };
                let monotonic = self.keyboards[i].monotonic;

                for ev in events {
                    let event_type = ev.event_type();
                    if event_type == EventType::SYNCHRONIZATION {
                        if ev.code() == SYN_REPORT {
                            self.forward(&mut frame)?;
                        }
                        continue;
                    }
                    let keep = event_type != EventType::KEY || {
                        let at = self.event_time(monotonic, &ev);
                        self.route_key(ev.code(), ev.value(), at, handler)
                    };
                    if keep {
                        frame.push(InputEvent::new(event_type, ev.code(), ev.value()));
                    }
                }
                self.forward(&mut frame)?;
            }
        }

        Ok(())
    }
}

impl KeyInterceptor for EvdevInterceptor {
    fn run(
        &mut self,
        running: &AtomicBool,
        handler: &mut dyn FnMut(&KeyEvent) -> Verdict,
    ) -> Result<(), InterceptError> {
        self.grab_all()?;
        let result = self.pump(running, handler);
        self.ungrab_all();
        log::info!("Released {} keyboard(s)", self.keyboards.len());
        result
    }

    fn describe(&self) -> String {
        let paths: Vec<String> = self
            .keyboards
            .iter()
            .map(|k| k.path.display().to_string())
            .collect();
        format!(
            "{} keyboard(s) via evdev: {}",
            self.device_count(),
            paths.join(", ")
        )
    }
}

impl Drop for EvdevInterceptor {
    fn drop(&mut self) {
        self.ungrab_all();
    }
}

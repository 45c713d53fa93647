//! Sense HAT adapters: 8x8 RGB565 LED matrix and joystick, located by device name.

use crate::input::{InputSource, Key};
use crate::playfield::{Playfield, TileColor};
use anyhow::Result;
use log::{info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use thiserror::Error;

pub const MATRIX_SIZE: usize = 8;
const FRAME_BYTES: usize = MATRIX_SIZE * MATRIX_SIZE * 2;

pub const FB_NAME: &str = "RPi-Sense FB";
pub const JOYSTICK_NAME: &str = "Raspberry Pi Sense HAT Joystick";

/// RGB565 black (pixel off).
pub const BLACK: u16 = 0x0000;

// struct input_event { struct timeval time; __u16 type; __u16 code; __s32 value; }
const TIMEVAL_SIZE: usize = 2 * size_of::<std::ffi::c_long>();
const EVENT_SIZE: usize = TIMEVAL_SIZE + 8;
const EVENT_BATCH: usize = 64;

const EV_KEY: u16 = 0x01;
const KEY_ENTER: u16 = 28;
const KEY_UP: u16 = 103;
const KEY_LEFT: u16 = 105;
const KEY_RIGHT: u16 = 106;
const KEY_DOWN: u16 = 108;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no {kind} device named {name:?} under {}", .dir.display())]
    NotFound {
        kind: &'static str,
        name: &'static str,
        dir: PathBuf,
    },
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// RGB565 value for a tile colour.
pub fn rgb565(color: TileColor) -> u16 {
    match color {
        TileColor::Red => 0xF800,
        TileColor::Green => 0x07E0,
        TileColor::Blue => 0x001F,
        TileColor::Magenta => 0xF81F,
        TileColor::Cyan => 0x07FF,
        TileColor::Yellow => 0xFFE0,
    }
}

/// Top-left 8x8 window of the playfield as a framebuffer image. Colourless tiles are red.
pub fn encode_frame(playfield: &Playfield) -> [u8; FRAME_BYTES] {
    let mut frame = [0u8; FRAME_BYTES];
    for (y, row) in playfield.rows().take(MATRIX_SIZE).enumerate() {
        for (x, cell) in row.iter().take(MATRIX_SIZE).enumerate() {
            let pixel = if cell.occupied {
                cell.color.map_or(rgb565(TileColor::Red), rgb565)
            } else {
                BLACK
            };
            let i = (y * MATRIX_SIZE + x) * 2;
            frame[i..i + 2].copy_from_slice(&pixel.to_le_bytes());
        }
    }
    frame
}

/// Finds `<dev_dir>/<entry>` for the first `<class_dir>/<prefix>N` (lowest N) whose
/// `name_file` holds `name`.
fn find_device(
    kind: &'static str,
    class_dir: &Path,
    prefix: &str,
    name_file: &str,
    name: &'static str,
    dev_dir: &Path,
) -> Result<PathBuf, DeviceError> {
    let entries = fs::read_dir(class_dir).map_err(|source| DeviceError::Io {
        path: class_dir.to_path_buf(),
        source,
    })?;
    let mut candidates: Vec<(u32, String)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let entry = e.file_name().to_string_lossy().into_owned();
            let n = entry.strip_prefix(prefix)?.parse().ok()?;
            Some((n, entry))
        })
        .collect();
    candidates.sort();

    for (_, entry) in candidates {
        let Ok(found) = fs::read_to_string(class_dir.join(&entry).join(name_file)) else {
            continue;
        };
        if found.trim() == name {
            let path = dev_dir.join(&entry);
            info!("{kind} {name:?} at {}", path.display());
            return Ok(path);
        }
    }
    Err(DeviceError::NotFound {
        kind,
        name,
        dir: class_dir.to_path_buf(),
    })
}

/// LED matrix framebuffer. Blanked when dropped.
pub struct LedMatrix<W: Write + Seek = File> {
    out: W,
}

impl LedMatrix<File> {
    pub fn open() -> Result<Self, DeviceError> {
        let path = find_device(
            "framebuffer",
            Path::new("/sys/class/graphics"),
            "fb",
            "name",
            FB_NAME,
            Path::new("/dev"),
        )?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| DeviceError::Io {
                path: path.clone(),
                source,
            })?;
        let mut matrix = Self::new(file);
        matrix
            .clear()
            .map_err(|source| DeviceError::Io { path, source })?;
        Ok(matrix)
    }
}

impl<W: Write + Seek> LedMatrix<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Writes the playfield when it changed; otherwise leaves the matrix as is.
    pub fn render(&mut self, playfield: &Playfield, changed: bool) -> io::Result<()> {
        if changed {
            self.write_frame(&encode_frame(playfield))?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> io::Result<()> {
        self.write_frame(&[0u8; FRAME_BYTES])
    }

    fn write_frame(&mut self, frame: &[u8; FRAME_BYTES]) -> io::Result<()> {
        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(frame)?;
        self.out.flush()
    }

    #[cfg(test)]
    fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write + Seek> Drop for LedMatrix<W> {
    fn drop(&mut self) {
        if let Err(e) = self.clear() {
            warn!("failed to blank LED matrix: {e}");
        }
    }
}

/// First joystick press in a batch of raw `input_event` records.
pub fn parse_events(buf: &[u8]) -> Option<Key> {
    buf.chunks_exact(EVENT_SIZE).find_map(|ev| {
        let body = &ev[TIMEVAL_SIZE..];
        let kind = u16::from_ne_bytes([body[0], body[1]]);
        let code = u16::from_ne_bytes([body[2], body[3]]);
        let value = i32::from_ne_bytes([body[4], body[5], body[6], body[7]]);
        if kind != EV_KEY || value != 1 {
            return None;
        }
        match code {
            KEY_ENTER => Some(Key::Confirm),
            KEY_UP => Some(Key::Up),
            KEY_DOWN => Some(Key::Down),
            KEY_LEFT => Some(Key::Left),
            KEY_RIGHT => Some(Key::Right),
            _ => None,
        }
    })
}

fn read_events<R: Read>(mut reader: R, tx: &Sender<Key>) {
    let mut buf = [0u8; EVENT_SIZE * EVENT_BATCH];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) if n < EVENT_SIZE => {
                warn!("joystick: expected {EVENT_SIZE} bytes, got {n}");
            }
            Ok(n) => {
                if let Some(key) = parse_events(&buf[..n]) {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("joystick read failed: {e}");
                break;
            }
        }
    }
}

/// Joystick events arrive on a reader thread; polling never blocks.
///
/// The reader thread is detached. It ends on EOF, on a read error, or on its
/// next event after the `Joystick` is dropped; until then it stays blocked in `read`.
pub struct Joystick {
    rx: Receiver<Key>,
}

impl Joystick {
    pub fn open() -> Result<Self, DeviceError> {
        let path = find_device(
            "joystick",
            Path::new("/sys/class/input"),
            "event",
            "device/name",
            JOYSTICK_NAME,
            Path::new("/dev/input"),
        )?;
        let file = File::open(&path).map_err(|source| DeviceError::Io { path, source })?;
        Ok(Self::from_reader(file))
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || read_events(reader, &tx));
        Self { rx }
    }
}

impl InputSource for Joystick {
    fn poll_key(&mut self) -> Result<Key> {
        Ok(self.rx.try_recv().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn event(kind: u16, code: u16, value: i32) -> Vec<u8> {
        let mut ev = vec![0u8; TIMEVAL_SIZE];
        ev.extend_from_slice(&kind.to_ne_bytes());
        ev.extend_from_slice(&code.to_ne_bytes());
        ev.extend_from_slice(&value.to_ne_bytes());
        ev
    }

    fn pixel(frame: &[u8], x: usize, y: usize) -> u16 {
        let i = (y * MATRIX_SIZE + x) * 2;
        u16::from_le_bytes([frame[i], frame[i + 1]])
    }

    #[test]
    fn test_encode_frame_colours() {
        let mut pf = Playfield::new(8, 8);
        pf.place(crate::playfield::Coord::new(3, 0), Some(TileColor::Cyan));
        pf.place(crate::playfield::Coord::new(7, 7), None);
        let frame = encode_frame(&pf);
        assert_eq!(pixel(&frame, 3, 0), 0x07FF);
        assert_eq!(pixel(&frame, 7, 7), 0xF800);
        assert_eq!(pixel(&frame, 0, 0), BLACK);
    }

    #[test]
    fn test_encode_frame_clips_large_playfield() {
        let mut pf = Playfield::new(10, 12);
        pf.place(crate::playfield::Coord::new(9, 11), Some(TileColor::Blue));
        pf.place(crate::playfield::Coord::new(7, 7), Some(TileColor::Yellow));
        let frame = encode_frame(&pf);
        assert_eq!(pixel(&frame, 7, 7), 0xFFE0);
        assert_eq!(frame.chunks(2).filter(|p| p.iter().any(|b| *b != 0)).count(), 1);
    }

    #[test]
    fn test_render_only_when_changed() {
        let mut matrix = LedMatrix::new(Cursor::new(Vec::new()));
        let mut pf = Playfield::new(8, 8);
        pf.place(crate::playfield::Coord::new(0, 0), Some(TileColor::Green));
        matrix.render(&pf, false).unwrap();
        assert!(matrix.get_ref().get_ref().is_empty());
        matrix.render(&pf, true).unwrap();
        let written = matrix.get_ref().get_ref();
        assert_eq!(written.len(), FRAME_BYTES);
        assert_eq!(pixel(written, 0, 0), 0x07E0);
    }

    #[test]
    fn test_parse_events_key_down_only() {
        let mut buf = event(EV_KEY, KEY_LEFT, 0);
        buf.extend(event(EV_KEY, KEY_LEFT, 2));
        buf.extend(event(0x00, 0, 0));
        assert_eq!(parse_events(&buf), None);
        buf.extend(event(EV_KEY, KEY_DOWN, 1));
        buf.extend(event(EV_KEY, KEY_UP, 1));
        assert_eq!(parse_events(&buf), Some(Key::Down));
        assert_eq!(parse_events(&event(EV_KEY, KEY_ENTER, 1)), Some(Key::Confirm));
    }

    #[test]
    fn test_joystick_forwards_presses() {
        let mut buf = event(EV_KEY, KEY_RIGHT, 1);
        buf.extend(event(EV_KEY, KEY_RIGHT, 0));
        let mut joystick = Joystick::from_reader(Cursor::new(buf));
        let mut got = Key::None;
        for _ in 0..200 {
            got = joystick.poll_key().unwrap();
            if !got.is_none() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got, Key::Right);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(joystick.poll_key().unwrap(), Key::None);
    }

    #[test]
    fn test_joystick_reader_exits_on_eof() {
        let joystick = Joystick::from_reader(Cursor::new(event(EV_KEY, KEY_UP, 1)));
        assert_eq!(joystick.rx.recv_timeout(Duration::from_secs(1)), Ok(Key::Up));
        // Sender dropped with the finished thread.
        assert_eq!(
            joystick.rx.recv_timeout(Duration::from_secs(1)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_find_device_by_name() {
        let root = tempfile::tempdir().unwrap();
        let class = root.path().join("class");
        for (entry, name) in [("fb0", "vc4drmfb"), ("fb1", FB_NAME), ("fb10", FB_NAME), ("fbx", FB_NAME)] {
            fs::create_dir_all(class.join(entry)).unwrap();
            fs::write(class.join(entry).join("name"), format!("{name}\n")).unwrap();
        }
        let found = find_device("framebuffer", &class, "fb", "name", FB_NAME, Path::new("/dev"));
        assert_eq!(found.unwrap(), PathBuf::from("/dev/fb1"));

        let missing = find_device("joystick", &class, "fb", "name", JOYSTICK_NAME, Path::new("/dev"));
        assert!(matches!(missing, Err(DeviceError::NotFound { .. })));
    }
}

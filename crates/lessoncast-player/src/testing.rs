//! Recording fakes of the runtime traits.
//!
//! Every call on the runtime, its engines and the element lands in one shared
//! log so tests can assert on ordering across all three.

use crate::error::PlaybackError;
use crate::runtime::{HlsEngine, MediaElement, MediaRuntime, ObjectUrl};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    CreateObjectUrl(String),
    RevokeObjectUrl(String),
    CreateEngine(u32),
    LoadSource(u32, String),
    AttachMedia(u32),
    StartLoad(u32),
    RecoverMedia(u32),
    Destroy(u32),
    SetSource(String),
    ClearSource,
    Play,
}

#[derive(Default)]
struct Log {
    ops: Vec<Op>,
    blobs: Vec<String>,
    engines: u32,
    media_source: bool,
    native_hls: bool,
    autoplay_blocked: bool,
}

/// Cheap handle; clones share the same log.
#[derive(Clone)]
pub struct FakeRuntime {
    log: Rc<RefCell<Log>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    /// MediaSource support and native HLS both available.
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Log {
                media_source: true,
                native_hls: true,
                ..Default::default()
            })),
        }
    }

    pub fn without_media_source() -> Self {
        let runtime = Self::new();
        runtime.log.borrow_mut().media_source = false;
        runtime
    }

    pub fn without_native_hls(self) -> Self {
        self.log.borrow_mut().native_hls = false;
        self
    }

    pub fn blocking_autoplay(self) -> Self {
        self.log.borrow_mut().autoplay_blocked = true;
        self
    }

    pub fn boxed(&self) -> Box<dyn MediaRuntime> {
        Box::new(self.clone())
    }

    pub fn element(&self) -> Box<dyn MediaElement> {
        Box::new(FakeElement {
            log: self.log.clone(),
        })
    }

    pub fn ops(&self) -> Vec<Op> {
        self.log.borrow().ops.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Op) -> bool) -> usize {
        self.log.borrow().ops.iter().filter(|op| predicate(op)).count()
    }

    /// Text of every blob created so far.
    pub fn blob_contents(&self) -> Vec<String> {
        self.log.borrow().blobs.clone()
    }

    fn record(&self, op: Op) {
        self.log.borrow_mut().ops.push(op);
    }
}

impl MediaRuntime for FakeRuntime {
    fn supports_media_source(&self) -> bool {
        self.log.borrow().media_source
    }

    fn create_engine(&self) -> Box<dyn HlsEngine> {
        let id = {
            let mut log = self.log.borrow_mut();
            log.engines += 1;
            log.engines
        };
        self.record(Op::CreateEngine(id));
        Box::new(FakeEngine {
            id,
            log: self.log.clone(),
        })
    }

    fn create_object_url(&self, data: Vec<u8>, _mime: &str) -> ObjectUrl {
        let url = {
            let mut log = self.log.borrow_mut();
            log.blobs.push(String::from_utf8_lossy(&data).into_owned());
            format!("blob:{}", log.blobs.len())
        };
        self.record(Op::CreateObjectUrl(url.clone()));
        ObjectUrl::new(url)
    }

    fn revoke_object_url(&self, url: ObjectUrl) {
        self.record(Op::RevokeObjectUrl(url.into_inner()));
    }
}

struct FakeEngine {
    id: u32,
    log: Rc<RefCell<Log>>,
}

impl FakeEngine {
    fn record(&self, op: Op) {
        self.log.borrow_mut().ops.push(op);
    }
}

impl HlsEngine for FakeEngine {
    fn load_source(&mut self, url: &str) {
        self.record(Op::LoadSource(self.id, url.to_string()));
    }

    fn attach_media(&mut self, _element: &mut dyn MediaElement) {
        self.record(Op::AttachMedia(self.id));
    }

    fn start_load(&mut self) {
        self.record(Op::StartLoad(self.id));
    }

    fn recover_media_error(&mut self) {
        self.record(Op::RecoverMedia(self.id));
    }

    fn destroy(&mut self) {
        self.record(Op::Destroy(self.id));
    }
}

struct FakeElement {
    log: Rc<RefCell<Log>>,
}

impl MediaElement for FakeElement {
    fn set_source(&mut self, url: &str) {
        self.log.borrow_mut().ops.push(Op::SetSource(url.to_string()));
    }

    fn clear_source(&mut self) {
        self.log.borrow_mut().ops.push(Op::ClearSource);
    }

    fn can_play_type(&self, _mime: &str) -> bool {
        self.log.borrow().native_hls
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let mut log = self.log.borrow_mut();
        log.ops.push(Op::Play);
        if log.autoplay_blocked {
            return Err(PlaybackError::AutoplayBlocked("NotAllowedError".to_string()));
        }
        Ok(())
    }
}

use std::collections::HashMap;
use std::fmt;

use serialframe_frame::{Frame, Mission1, Mission2, Mission2Layout, MISSION_1, MISSION_2, PAYLOAD_OFFSET};

/// Callback for frames carrying one mission tag.
///
/// Runs synchronously on the reader task, so a slow handler delays every
/// frame behind it.
pub trait MissionHandler: Send + Sync {
    fn handle(&self, frame: &Frame);
}

impl<F> MissionHandler for F
where
    F: Fn(&Frame) + Send + Sync,
{
    fn handle(&self, frame: &Frame) {
        self(frame)
    }
}

struct Route {
    handler: Box<dyn MissionHandler>,
    min_frame_len: usize,
}

/// Mission tag → handler routing, fixed when the engine is built.
#[derive(Default)]
pub struct DispatchTable {
    routes: HashMap<u8, Route>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route raw frames tagged `tag` to `handler`. Replaces any earlier route.
    pub fn on(self, tag: u8, handler: impl MissionHandler + 'static) -> Self {
        self.route(tag, PAYLOAD_OFFSET + 1, handler)
    }

    /// Route mission 0x01 frames, decoded, to `handler`.
    pub fn on_mission1<F>(self, handler: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.route(MISSION_1, PAYLOAD_OFFSET + 4 + 1, move |frame: &Frame| {
            if let Some(m) = Mission1::decode(frame) {
                handler(m.x);
            }
        })
    }

    /// Route mission 0x02 frames, decoded with `layout`, to `handler`.
    pub fn on_mission2<F>(self, layout: Mission2Layout, handler: F) -> Self
    where
        F: Fn(u16, f32) + Send + Sync + 'static,
    {
        self.route(MISSION_2, layout.min_frame_len(), move |frame: &Frame| {
            if let Some(m) = Mission2::decode(frame, layout) {
                handler(m.x, m.y);
            }
        })
    }

    fn route(mut self, tag: u8, min_frame_len: usize, handler: impl MissionHandler + 'static) -> Self {
        self.routes.insert(
            tag,
            Route {
                handler: Box::new(handler),
                min_frame_len,
            },
        );
        self
    }

    /// Hand `frame` to its handler. Returns false when no route matches.
    pub fn dispatch(&self, frame: &Frame) -> bool {
        match self.routes.get(&frame.tag()) {
            Some(route) => {
                route.handler.handle(frame);
                true
            }
            None => false,
        }
    }

    /// First route whose payload cannot fit a `frame_len`-byte frame.
    pub fn check_frame_len(&self, frame_len: usize) -> Option<(u8, usize)> {
        let mut tags: Vec<_> = self.routes.iter().collect();
        tags.sort_by_key(|(tag, _)| **tag);
        tags.into_iter()
            .find(|(_, route)| route.min_frame_len > frame_len)
            .map(|(tag, route)| (*tag, route.min_frame_len))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.routes.keys().copied().collect();
        tags.sort_unstable();
        f.debug_struct("DispatchTable").field("tags", &tags).finish()
    }
}

//! Call frames and variables.
//!
//! A [`FrameStack`] holds the frames of the dynamic call stack.  Frame 0 is
//! the global frame; each procedure call pushes a frame whose parent is the
//! frame in effect at the call, which `uplevel` may have redirected.
//!
//! A variable slot is either a direct value cell or an up-link to a slot in
//! an older frame (the `upvar`/`global` mechanism).  Links always point to
//! strictly older frames, which the stack discipline keeps alive for the
//! link's whole lifetime.

use crate::types::*;
use crate::value::Value;
use indexmap::IndexMap;

// Bounds link-chain walks; a cycle built with self-referential upvars reads
// as "variable does not exist" instead of hanging.
const MAX_LINK_DEPTH: usize = 100;

#[derive(Debug, Clone)]
enum Var {
    Cell(Value),
    Link { frame: usize, name: String },
}

#[derive(Debug)]
struct Frame {
    vars: IndexMap<String, Var>,
    parent: usize,
    debug_name: String,
}

#[derive(Debug)]
pub(crate) struct FrameStack {
    frames: Vec<Frame>,
    current: usize,
}

impl FrameStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame {
                vars: IndexMap::new(),
                parent: 0,
                debug_name: "global".to_string(),
            }],
            current: 0,
        }
    }

    /// Pushes a frame for a procedure call.  Its parent is the frame in
    /// effect right now.
    pub fn push(&mut self, debug_name: &str) {
        let parent = self.current;
        self.frames.push(Frame {
            vars: IndexMap::new(),
            parent,
            debug_name: debug_name.to_string(),
        });
        self.current = self.frames.len() - 1;
    }

    /// Pops the frame pushed by the matching [`push`](Self::push), restoring
    /// its parent as the current frame.
    pub fn pop(&mut self) {
        debug_assert_eq!(self.current, self.frames.len() - 1);
        debug_assert!(self.frames.len() > 1, "cannot pop the global frame");
        if self.frames.len() > 1 {
            self.current = self.frames[self.current].parent;
            self.frames.pop();
        }
    }

    /// The index of the current frame.
    pub fn current_level(&self) -> usize {
        self.current
    }

    /// Redirects the current frame, for `uplevel`.  The caller must restore
    /// the saved level afterwards.
    pub fn set_current_level(&mut self, level: usize) {
        self.current = level.min(self.frames.len() - 1);
    }

    /// Walks `count` parents up from the current frame, saturating at the
    /// global frame.
    pub fn level_up(&self, count: usize) -> usize {
        let mut level = self.current;
        for _ in 0..count {
            if level == 0 {
                break;
            }
            level = self.frames[level].parent;
        }
        level
    }

    pub fn frame_debug_name(&self) -> &str {
        &self.frames[self.current].debug_name
    }

    /// Follows link slots from `(level, name)` to the owning frame and
    /// terminal name.  `None` on a link cycle.
    fn resolve(&self, mut level: usize, name: &str) -> Option<(usize, String)> {
        let mut key = name.to_string();
        for _ in 0..MAX_LINK_DEPTH {
            match self.frames[level].vars.get(&key) {
                Some(Var::Link { frame, name }) => {
                    level = *frame;
                    key = name.clone();
                }
                _ => return Some((level, key)),
            }
        }
        None
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let (level, key) = self.resolve(self.current, name)?;
        match self.frames[level].vars.get(&key) {
            Some(Var::Cell(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a variable in the current frame, following links, creating the
    /// terminal cell if needed.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), Exception> {
        match self.resolve(self.current, name) {
            Some((level, key)) => {
                self.frames[level].vars.insert(key, Var::Cell(value));
                Ok(())
            }
            None => Err(Exception::error(Value::from(format!(
                "too many levels of indirection for variable \"{}\"",
                name
            )))),
        }
    }

    /// Sets a variable directly in the current frame, bypassing links.
    /// Procedure calls use this to bind formals into a fresh frame.
    pub fn set_local(&mut self, name: &str, value: Value) {
        let current = self.current;
        self.frames[current]
            .vars
            .insert(name.to_string(), Var::Cell(value));
    }

    /// Installs `local` in the current frame as a link to `remote` in the
    /// frame at `level`.  Linking a slot to itself (e.g. `global` run at the
    /// global frame) is a no-op rather than a cycle.
    pub fn link(&mut self, local: &str, level: usize, remote: &str) {
        let current = self.current;
        if level == current && remote == local {
            return;
        }
        self.frames[current].vars.insert(
            local.to_string(),
            Var::Link {
                frame: level,
                name: remote.to_string(),
            },
        );
    }

    /// The names visible in the current frame, cells and links alike.
    pub fn local_names(&self) -> Vec<String> {
        self.frames[self.current].vars.keys().cloned().collect()
    }

    pub fn global_names(&self) -> Vec<String> {
        self.frames[0].vars.keys().cloned().collect()
    }

    /// The name/value pairs of the current frame, links resolved, for the
    /// local snapshot in proc stack traces.
    pub fn local_cells(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for (name, var) in &self.frames[self.current].vars {
            match var {
                Var::Cell(value) => out.push((name.clone(), value.clone())),
                Var::Link { .. } => {
                    if let Some(value) = self.get(name) {
                        out.push((name.clone(), value));
                    }
                }
            }
        }
        out
    }

    /// Direct cells of the global frame as string pairs, for seeding a
    /// detached interpreter.
    pub fn global_snapshot(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (name, var) in &self.frames[0].vars {
            if let Var::Cell(value) = var {
                out.push((name.clone(), value.as_str().into_owned()));
            }
        }
        out
    }
}

// SPDX-License-Identifier: MIT

//! Build the environment handed to an external program.
//!
//! The inherited array is only read.  The result is a fresh, independently
//! owned copy: entries that point into the bundle are dropped, and in portable
//! mode HOME and the XDG config/data directories are put back to what the
//! user had before the bundle started.

mod denylist;

use std::{
    ffi::{CStr, CString, OsStr, c_char},
    os::unix::ffi::OsStrExt as _,
};

use tracing::debug;

use crate::{
    config::{self, BundleEnv},
    error::ShimError,
    portable::{PortableSnapshot, portable_mode_active},
};

use denylist::DENYLIST;

/// Room for HOME, XDG_CONFIG_HOME and XDG_DATA_HOME entries synthesized after
/// the scan, plus one spare.
const SYNTH_SLACK: usize = 4;

/// Outcome of sanitizing an environment.
#[derive(Debug)]
pub enum CleanEnv {
    /// No bundle root; the caller keeps using its own array.
    Unchanged,
    Cleaned(EnvBlock),
}

/// An owned, null-terminated `char *envp[]`.
#[derive(Debug)]
pub struct EnvBlock {
    entries: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl EnvBlock {
    fn with_capacity(capacity: usize) -> Result<Self, ShimError> {
        let mut entries = Vec::new();
        entries.try_reserve_exact(capacity)?;
        Ok(EnvBlock {
            entries,
            ptrs: Vec::new(),
        })
    }

    fn push(&mut self, entry: CString) {
        self.entries.push(entry);
    }

    /// Build the pointer array.  The `CString` buffers live on the heap, so
    /// the pointers stay valid when the block itself is moved.
    fn finish(mut self) -> Result<Self, ShimError> {
        self.ptrs.try_reserve_exact(self.entries.len() + 1)?;
        self.ptrs.extend(self.entries.iter().map(|e| e.as_ptr()));
        self.ptrs.push(std::ptr::null());
        Ok(self)
    }

    /// Pointer suitable for the `envp` argument of the exec family.
    /// Valid for as long as `self` is.
    pub fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }

    pub fn entries(&self) -> &[CString] {
        &self.entries
    }
}

/// Read a null-terminated `envp` array.  A null `envp` reads as empty.
///
/// # Safety
///
/// `envp` must be null or point to a null-terminated array of valid C strings
/// that outlive `'a`.
pub unsafe fn entries_from_ptr<'a>(envp: *const *const c_char) -> Vec<&'a CStr> {
    let mut ret = Vec::new();
    if envp.is_null() {
        return ret;
    }
    let mut i = 0;
    loop {
        // SAFETY: the caller guarantees the array is null-terminated.
        let p = unsafe { *envp.add(i) };
        if p.is_null() {
            break;
        }
        // SAFETY: every non-null entry is a valid C string.
        ret.push(unsafe { CStr::from_ptr(p) });
        i += 1;
    }
    ret
}

/// The value of `entry` if it is exactly `name=...`.
pub(crate) fn value_of<'e>(entry: &'e [u8], name: &str) -> Option<&'e [u8]> {
    entry
        .strip_prefix(name.as_bytes())
        .and_then(|rest| rest.strip_prefix(b"="))
}

/// The value of the first `name=...` entry.
pub(crate) fn find_value<'e>(entries: &[&'e CStr], name: &str) -> Option<&'e [u8]> {
    entries.iter().find_map(|e| value_of(e.to_bytes(), name))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Produce the environment for an external program.
///
/// `snapshot` is only called when portable mode is active, which keeps the
/// parent-process lookup off the common path.
pub fn sanitize<'s, F>(
    entries: &[&CStr],
    bundle: &BundleEnv,
    snapshot: F,
) -> Result<CleanEnv, ShimError>
where
    F: FnOnce() -> Option<&'s PortableSnapshot>,
{
    let Some(root) = bundle.appdir() else {
        return Ok(CleanEnv::Unchanged);
    };

    let snapshot = if portable_mode_active(entries, bundle) {
        debug!("Portable mode detected");
        snapshot()
    } else {
        None
    };
    let mut dirs = snapshot.map(|snap| PortableDirs::new(snap, bundle));

    let mut out = EnvBlock::with_capacity(entries.len() + SYNTH_SLACK)?;
    for entry in entries {
        let bytes = entry.to_bytes();
        if let Some(dirs) = dirs.as_mut() {
            match dirs.rewrite(bytes)? {
                Rewrite::Replace(e) => {
                    out.push(e);
                    continue;
                }
                Rewrite::Drop => continue,
                Rewrite::Keep => {}
            }
        }
        if points_into_bundle(bytes, root) {
            continue;
        }
        out.push((*entry).to_owned());
    }

    if let Some(dirs) = dirs {
        for e in dirs.missing()? {
            out.push(e);
        }
    }

    out.finish().map(CleanEnv::Cleaned)
}

/// True for a denylisted variable whose value mentions the bundle root.
fn points_into_bundle(entry: &[u8], root: &[u8]) -> bool {
    for name in DENYLIST {
        if let Some(value) = value_of(entry, name) {
            if contains(value, root) {
                debug!("Unset env var {} (points to APPDIR)", name);
                return true;
            }
            return false;
        }
    }
    false
}

enum Rewrite {
    Replace(CString),
    Drop,
    Keep,
}

/// One of HOME, XDG_CONFIG_HOME, XDG_DATA_HOME, with what to do about it.
struct PortableDir<'s> {
    name: &'static str,
    /// The value to restore.  For the XDG pair, `Some` also means the parent
    /// had the variable set.
    original: Option<&'s OsStr>,
    /// The bundle's portable path; an entry equal to it is dropped when there
    /// is nothing to restore.  HOME is never dropped.
    portable: Option<Vec<u8>>,
    seen: bool,
}

struct PortableDirs<'s> {
    dirs: [PortableDir<'s>; 3],
}

impl<'s> PortableDirs<'s> {
    fn new(snap: &'s PortableSnapshot, bundle: &BundleEnv) -> Self {
        PortableDirs {
            dirs: [
                PortableDir {
                    name: config::HOME,
                    original: snap.home(),
                    portable: None,
                    seen: false,
                },
                PortableDir {
                    name: config::XDG_CONFIG_HOME,
                    original: snap.config_home(),
                    portable: bundle.portable_config_home(),
                    seen: false,
                },
                PortableDir {
                    name: config::XDG_DATA_HOME,
                    original: snap.data_home(),
                    portable: bundle.portable_data_home(),
                    seen: false,
                },
            ],
        }
    }

    fn rewrite(&mut self, entry: &[u8]) -> Result<Rewrite, ShimError> {
        for dir in self.dirs.iter_mut() {
            let Some(value) = value_of(entry, dir.name) else {
                continue;
            };
            dir.seen = true;
            if let Some(original) = dir.original {
                debug!("Restored {} for external process: {:?}", dir.name, original);
                return Ok(Rewrite::Replace(env_entry(dir.name, original)?));
            }
            if dir.portable.as_deref() == Some(value) {
                debug!("Unset {} (portable path, parent had none)", dir.name);
                return Ok(Rewrite::Drop);
            }
            return Ok(Rewrite::Keep);
        }
        Ok(Rewrite::Keep)
    }

    /// Entries for restorable variables the input never mentioned.
    fn missing(self) -> Result<Vec<CString>, ShimError> {
        let mut ret = Vec::new();
        for dir in self.dirs {
            if dir.seen {
                continue;
            }
            if let Some(original) = dir.original {
                debug!("Added {} for external process: {:?}", dir.name, original);
                ret.push(env_entry(dir.name, original)?);
            }
        }
        Ok(ret)
    }
}

fn env_entry(name: &str, value: &OsStr) -> Result<CString, ShimError> {
    let mut buf = Vec::with_capacity(name.len() + 1 + value.len());
    buf.extend_from_slice(name.as_bytes());
    buf.push(b'=');
    buf.extend_from_slice(value.as_bytes());
    Ok(CString::new(buf)?)
}

#[cfg(test)]
mod tests {
    use std::{ffi::OsString, os::unix::ffi::OsStringExt as _};

    use super::*;

    const ROOT: &str = "/tmp/.mount_App";
    const IMAGE: &str = "/path/App.AppImage";

    fn cstrings(items: &[&str]) -> Vec<CString> {
        items.iter().map(|s| CString::new(*s).unwrap()).collect()
    }

    fn refs(items: &[CString]) -> Vec<&CStr> {
        items.iter().map(|c| c.as_c_str()).collect()
    }

    fn bundle() -> BundleEnv {
        BundleEnv::new(Some(ROOT.into()), Some(IMAGE.into()))
    }

    fn no_snapshot() -> Option<&'static PortableSnapshot> {
        None
    }

    fn cleaned(res: Result<CleanEnv, ShimError>) -> Vec<String> {
        match res.unwrap() {
            CleanEnv::Cleaned(block) => block
                .entries()
                .iter()
                .map(|c| c.to_str().unwrap().to_string())
                .collect(),
            CleanEnv::Unchanged => panic!("expected a cleaned environment"),
        }
    }

    #[test]
    fn unset_root_is_unchanged() {
        let env = cstrings(&["LD_LIBRARY_PATH=/tmp/.mount_App/usr/lib", "TERM=xterm"]);
        let res = sanitize(&refs(&env), &BundleEnv::default(), no_snapshot).unwrap();
        assert!(matches!(res, CleanEnv::Unchanged));
    }

    #[test]
    fn drops_loader_path_keeps_term() {
        let env = cstrings(&["LD_LIBRARY_PATH=/bundle/lib", "TERM=xterm-256color"]);
        let b = BundleEnv::new(Some("/bundle".into()), None);
        assert_eq!(
            cleaned(sanitize(&refs(&env), &b, no_snapshot)),
            vec!["TERM=xterm-256color"]
        );
    }

    #[test]
    fn denylisted_outside_bundle_kept_in_order() {
        let env = cstrings(&[
            "QT_PLUGIN_PATH=/usr/lib/qt/plugins",
            "GST_PLUGIN_PATH=/tmp/.mount_App/usr/lib/gstreamer-1.0",
            "PATH=/tmp/.mount_App/usr/bin:/usr/bin",
            "PYTHONHOME=/usr",
            "GTK_PATH=/opt/gtk:/tmp/.mount_App/usr/lib/gtk-3.0",
        ]);
        assert_eq!(
            cleaned(sanitize(&refs(&env), &bundle(), no_snapshot)),
            vec![
                "QT_PLUGIN_PATH=/usr/lib/qt/plugins",
                "PATH=/tmp/.mount_App/usr/bin:/usr/bin",
                "PYTHONHOME=/usr",
            ]
        );
    }

    #[test]
    fn similar_names_are_not_denylisted() {
        let env = cstrings(&[
            "LD_LIBRARY_PATHS=/tmp/.mount_App/lib",
            "MY_LD_PRELOAD=/tmp/.mount_App/lib/x.so",
        ]);
        assert_eq!(
            cleaned(sanitize(&refs(&env), &bundle(), no_snapshot)),
            vec![
                "LD_LIBRARY_PATHS=/tmp/.mount_App/lib",
                "MY_LD_PRELOAD=/tmp/.mount_App/lib/x.so",
            ]
        );
    }

    #[test]
    fn sanitizing_twice_is_stable() {
        let env = cstrings(&[
            "LD_PRELOAD=/tmp/.mount_App/lib/exec.so",
            "GCONV_PATH=/usr/lib/gconv",
            "LANG=C.UTF-8",
        ]);
        let once = cleaned(sanitize(&refs(&env), &bundle(), no_snapshot));
        let again_src: Vec<CString> = once.iter().map(|s| CString::new(s.as_str()).unwrap()).collect();
        let twice = cleaned(sanitize(&refs(&again_src), &bundle(), no_snapshot));
        assert_eq!(once, twice);
        assert_eq!(once, vec!["GCONV_PATH=/usr/lib/gconv", "LANG=C.UTF-8"]);
    }

    #[test]
    fn block_is_null_terminated() {
        let env = cstrings(&["A=1", "B=2"]);
        let CleanEnv::Cleaned(block) = sanitize(&refs(&env), &bundle(), no_snapshot).unwrap()
        else {
            panic!("expected a cleaned environment");
        };
        // SAFETY: the block owns a null-terminated array.
        let read = unsafe { entries_from_ptr(block.as_ptr()) };
        assert_eq!(read, refs(&env));
    }

    #[test]
    fn null_envp_is_empty() {
        // SAFETY: null is explicitly allowed.
        assert!(unsafe { entries_from_ptr(std::ptr::null()) }.is_empty());
    }

    #[test]
    fn portable_home_restored() {
        let snap = PortableSnapshot::new(Some("/home/alice".into()), None, None);
        let env = cstrings(&["HOME=/path/App.AppImage.home", "TERM=xterm"]);
        assert_eq!(
            cleaned(sanitize(&refs(&env), &bundle(), || Some(&snap))),
            vec!["HOME=/home/alice", "TERM=xterm"]
        );
    }

    #[test]
    fn portable_config_dropped_when_parent_had_none() {
        let snap = PortableSnapshot::new(Some("/home/alice".into()), None, None);
        let env = cstrings(&[
            "HOME=/home/alice",
            "XDG_CONFIG_HOME=/path/App.AppImage.config",
            "TERM=xterm",
        ]);
        let out = cleaned(sanitize(&refs(&env), &bundle(), || Some(&snap)));
        assert_eq!(out, vec!["HOME=/home/alice", "TERM=xterm"]);
        assert!(!out.iter().any(|e| e.starts_with("XDG_CONFIG_HOME=")));
    }

    #[test]
    fn portable_data_dropped_when_parent_had_none() {
        let snap = PortableSnapshot::new(
            Some("/home/alice".into()),
            Some("/home/alice/.cfg".into()),
            None,
        );
        let env = cstrings(&[
            "XDG_DATA_HOME=/path/App.AppImage.share",
            "XDG_CONFIG_HOME=/path/App.AppImage.config",
            "TERM=xterm",
        ]);
        let out = cleaned(sanitize(&refs(&env), &bundle(), || Some(&snap)));
        assert_eq!(
            out,
            vec!["XDG_CONFIG_HOME=/home/alice/.cfg", "TERM=xterm", "HOME=/home/alice"]
        );
        assert!(!out.iter().any(|e| e.starts_with("XDG_DATA_HOME=")));
    }

    #[test]
    fn portable_xdg_restored_when_parent_had_it() {
        let snap = PortableSnapshot::new(
            Some("/home/alice".into()),
            Some("/home/alice/.cfg".into()),
            Some("/home/alice/.data".into()),
        );
        let env = cstrings(&[
            "XDG_DATA_HOME=/path/App.AppImage.share",
            "HOME=/path/App.AppImage.home",
            "XDG_CONFIG_HOME=/path/App.AppImage.config",
        ]);
        assert_eq!(
            cleaned(sanitize(&refs(&env), &bundle(), || Some(&snap))),
            vec![
                "XDG_DATA_HOME=/home/alice/.data",
                "HOME=/home/alice",
                "XDG_CONFIG_HOME=/home/alice/.cfg",
            ]
        );
    }

    #[test]
    fn missing_entries_synthesized() {
        let snap = PortableSnapshot::new(
            Some("/home/alice".into()),
            Some("/home/alice/.cfg".into()),
            None,
        );
        let env = cstrings(&["XDG_DATA_HOME=/path/App.AppImage.share", "TERM=xterm"]);
        assert_eq!(
            cleaned(sanitize(&refs(&env), &bundle(), || Some(&snap))),
            vec!["TERM=xterm", "HOME=/home/alice", "XDG_CONFIG_HOME=/home/alice/.cfg"]
        );
    }

    #[test]
    fn user_xdg_value_kept_when_parent_had_none() {
        let snap = PortableSnapshot::new(Some("/home/alice".into()), None, None);
        let env = cstrings(&[
            "HOME=/path/App.AppImage.home",
            "XDG_CONFIG_HOME=/home/alice/custom",
        ]);
        assert_eq!(
            cleaned(sanitize(&refs(&env), &bundle(), || Some(&snap))),
            vec!["HOME=/home/alice", "XDG_CONFIG_HOME=/home/alice/custom"]
        );
    }

    #[test]
    fn no_snapshot_leaves_portable_dirs() {
        let env = cstrings(&[
            "HOME=/path/App.AppImage.home",
            "XDG_CONFIG_HOME=/path/App.AppImage.config",
        ]);
        assert_eq!(
            cleaned(sanitize(&refs(&env), &bundle(), no_snapshot)),
            vec![
                "HOME=/path/App.AppImage.home",
                "XDG_CONFIG_HOME=/path/App.AppImage.config",
            ]
        );
    }

    #[test]
    fn snapshot_not_consulted_outside_portable_mode() {
        let env = cstrings(&["HOME=/home/alice"]);
        let out = cleaned(sanitize(&refs(&env), &bundle(), || {
            panic!("snapshot requested outside portable mode")
        }));
        assert_eq!(out, vec!["HOME=/home/alice"]);
    }

    #[test]
    fn value_of_needs_equals() {
        assert_eq!(value_of(b"HOME=/x", "HOME"), Some(&b"/x"[..]));
        assert_eq!(value_of(b"HOME=", "HOME"), Some(&b""[..]));
        assert_eq!(value_of(b"HOMEX=/x", "HOME"), None);
        assert_eq!(value_of(b"HOME", "HOME"), None);
    }

    #[test]
    fn entry_with_nul_is_rejected() {
        let bad = OsString::from_vec(b"/home/a\0b".to_vec());
        assert!(matches!(
            env_entry("HOME", &bad),
            Err(ShimError::InteriorNul(_))
        ));
    }
}

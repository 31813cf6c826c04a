//! This module provides functions for saving and loading plans, including
//! the default plans directory. This directory is determined by the
//! `app_dirs` crate, which will return a path based on the operating
//! system (Windows, OS X, or Linux).
//!
//! Named plans are stored in the plans directory with the extension
//! `.plan.json`. Files with a different extension will not be recognized,
//! e.g. by the `plans` iterator function. A plan can also be saved to any
//! other path with `save_plan`; the name is then up to the caller.

use std::fs::{self, File, ReadDir};
use std::io::{BufWriter, Write};
use std::iter::Iterator;
use std::path::{Path, PathBuf};

use app_dirs::{self, AppDataType, AppDirsError, AppInfo};

use super::errors::*;
use super::SchedulePlan;

/// The information for app_dirs
const APP_INFO: AppInfo = AppInfo {
    name: "studyplan",
    author: "Ian Johnson",
};

/// The name given to a plan when the caller doesn't choose one.
pub const DEFAULT_PLAN_NAME: &str = "planner";

const PLAN_EXTENSION: &str = "plan.json";

/// An iterator over all the plans in the plans directory.
///
/// The iterator returns the name of each plan along with the result of
/// reading it, since a single unreadable file shouldn't hide the others.
pub struct Plans {
    /// The underlying `ReadDir` iterator
    read_dir: ReadDir,
}

impl Iterator for Plans {
    type Item = (String, Result<SchedulePlan>);

    fn next(&mut self) -> Option<(String, Result<SchedulePlan>)> {
        loop {
            let entry = self.read_dir.next()?;
            let path = match entry {
                Ok(e) => e.path(),
                Err(e) => {
                    let err = Err(e).chain_err(|| {
                        ErrorKind::Persistence("could not read directory item".into())
                    });
                    return Some((String::new(), err));
                }
            };

            // Skip over things that aren't files or don't have the proper
            // extension ('.plan.json')
            let name = match plan_name(&path) {
                Some(n) if path.is_file() => n,
                _ => continue,
            };
            return Some((name, read_plan_file(&path)));
        }
    }
}

/// Returns the plan name for a path ending in `.plan.json`.
fn plan_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let suffix = format!(".{}", PLAN_EXTENSION);
    if file_name.ends_with(&suffix) && file_name.len() > suffix.len() {
        Some(file_name[..file_name.len() - suffix.len()].to_owned())
    } else {
        None
    }
}

/// Returns an iterator over the plans in the plans directory if possible,
/// or an error if this cannot be done.
///
/// As noted in the module documentation, plans must have the extension
/// `.plan.json` to be recognized; the iterator will pass over any files
/// that do not have this extension.
pub fn plans() -> Result<Plans> {
    let dir = plans_dir_must_exist()?;

    Ok(Plans {
        read_dir: fs::read_dir(&dir)
            .chain_err(|| ErrorKind::Persistence("could not read from plans directory".into()))?,
    })
}

/// Returns the location of the plans directory if possible.
///
/// This only resolves the path; the directory is created lazily by
/// `save_plan`.
pub fn plans_dir() -> Result<PathBuf> {
    match app_dirs::get_app_dir(AppDataType::UserData, &APP_INFO, "plans") {
        Ok(p) => Ok(p),
        Err(AppDirsError::NotSupported) => Err(ErrorKind::CannotLocateDataDir.into()),
        Err(AppDirsError::Io(e)) => {
            Err(e).chain_err(|| ErrorKind::Persistence("could not find plans directory".into()))
        }
        Err(AppDirsError::InvalidAppInfo) => Err(ErrorKind::CannotLocateDataDir.into()),
    }
}

/// Returns the location of the plans directory, returning an error
/// if it doesn't exist.
fn plans_dir_must_exist() -> Result<PathBuf> {
    let path = plans_dir()?;
    if !path.is_dir() {
        Err(ErrorKind::NoPlansDirectory.into())
    } else {
        Ok(path)
    }
}

/// Returns the path a plan with the given name is stored at, inside
/// the plans directory.
pub fn plan_path(name: &str) -> Result<PathBuf> {
    let mut filename = plans_dir()?;
    filename.push(format!("{}.{}", name, PLAN_EXTENSION));
    Ok(filename)
}

/// Writes the plan as pretty-printed JSON to `path`, creating any missing
/// parent directories and overwriting an existing file.
///
/// This is not atomic: a failure part way through may leave a truncated
/// file behind.
pub fn save_plan(plan: &SchedulePlan, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            fs::create_dir_all(parent).chain_err(|| {
                ErrorKind::Persistence(format!("could not create directory '{}'", parent.display()))
            })?;
        }
    }

    let f = File::create(path).chain_err(|| {
        ErrorKind::Persistence(format!("could not create plan file '{}'", path.display()))
    })?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, plan)
        .chain_err(|| ErrorKind::Json("could not serialize plan to json".into()))?;
    writeln!(w).chain_err(|| ErrorKind::Persistence("could not write plan file".into()))?;
    w.flush().chain_err(|| ErrorKind::Persistence("could not write plan file".into()))
}

/// Reads a plan from any JSON file in the persisted format.
pub fn read_plan_file(path: &Path) -> Result<SchedulePlan> {
    let f = File::open(path).chain_err(|| {
        ErrorKind::Persistence(format!("could not open file '{}'", path.display()))
    })?;

    serde_json::from_reader(f)
        .chain_err(|| ErrorKind::Json(format!("json error in file '{}'", path.display())))
}

/// Reads the plan with the given name from the plans directory.
pub fn read_plan(name: &str) -> Result<SchedulePlan> {
    let filename = plan_path(name)?;
    if !filename.exists() {
        return Err(ErrorKind::PlanDoesNotExist(name.into()).into());
    }
    read_plan_file(&filename)
}

/// Attempts to remove the plan with the given name, returning
/// an error if it doesn't exist.
pub fn remove_plan(name: &str) -> Result<()> {
    let filename = plan_path(name)?;

    if !filename.exists() {
        Err(ErrorKind::PlanDoesNotExist(name.to_owned()).into())
    } else {
        fs::remove_file(&filename)
            .chain_err(|| ErrorKind::Persistence("could not remove plan file".into()))
    }
}

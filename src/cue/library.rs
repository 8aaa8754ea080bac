//! Directory scan and weighted cue selection

use std::path::Path;

use chrono::{Local, NaiveDate};
use rand::Rng;
use tracing::{debug, info, warn};

use super::CueFile;
use crate::error::CueError;

/// Cues in a folder that may still be played
///
/// Built fresh for every selection so that files added, removed or expiring
/// are picked up on the next check.
#[derive(Debug, Clone, Default)]
pub struct CueLibrary {
    cues: Vec<CueFile>,
    total_weight: u64,
}

impl CueLibrary {
    /// Scan `dir` for cues eligible on `today`
    ///
    /// Expired cues are logged and left out. Entries are sorted by file name.
    pub fn scan(dir: &Path, today: NaiveDate) -> Result<Self, CueError> {
        if !dir.is_dir() {
            return Err(CueError::MissingDirectory(dir.to_path_buf()));
        }

        let entries = std::fs::read_dir(dir).map_err(|source| CueError::ListError {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut cues = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(cue) = CueFile::from_path(path) else {
                continue;
            };

            if !cue.is_eligible_on(today) {
                info!(cue = %cue.file_name(), "Skipping expired cue");
                continue;
            }
            if cue.weight > 1 {
                debug!(cue = %cue.file_name(), weight = cue.weight, "Weighted cue");
            }
            cues.push(cue);
        }

        Ok(Self::from_cues(cues))
    }

    /// Build a library from already-parsed cues
    pub fn from_cues(mut cues: Vec<CueFile>) -> Self {
        cues.sort_by(|a, b| a.path.cmp(&b.path));
        let total_weight = cues.iter().map(|cue| u64::from(cue.weight)).sum();
        Self { cues, total_weight }
    }

    /// Eligible cues, sorted by path
    pub fn cues(&self) -> &[CueFile] {
        &self.cues
    }

    /// Number of eligible cues
    pub fn len(&self) -> usize {
        self.cues.len()
    }

    /// Whether no cue is eligible
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Sum of all eligible weights
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Draw one cue with probability proportional to its weight
    pub fn choose<R: Rng>(&self, rng: &mut R) -> Option<&CueFile> {
        if self.total_weight == 0 {
            return None;
        }

        let mut ticket = rng.gen_range(0..self.total_weight);
        for cue in &self.cues {
            let weight = u64::from(cue.weight);
            if ticket < weight {
                return Some(cue);
            }
            ticket -= weight;
        }

        // Unreachable while total_weight is the sum of the weights
        self.cues.last()
    }
}

/// Pick a cue from `dir` for today using the thread RNG
pub fn select_cue(dir: &Path) -> Option<CueFile> {
    select_cue_with(dir, Local::now().date_naive(), &mut rand::thread_rng())
}

/// Pick a cue from `dir` as of `today`
///
/// Returns `None` and logs a warning when the folder is missing or holds no
/// eligible cue.
pub fn select_cue_with<R: Rng>(
    dir: &Path,
    today: NaiveDate,
    rng: &mut R,
) -> Option<CueFile> {
    let library = match CueLibrary::scan(dir, today) {
        Ok(library) => library,
        Err(e) => {
            warn!(error = %e, "Cue folder unavailable");
            return None;
        }
    };

    match library.choose(rng) {
        Some(cue) => {
            info!(cue = %cue.file_name(), weight = cue.weight, "Chose weighted random cue");
            Some(cue.clone())
        }
        None => {
            warn!(
                folder = %dir.display(),
                "No valid cues (unexpired or permanent) found in the folder"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn folder(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        dir
    }

    fn names(library: &CueLibrary) -> Vec<String> {
        library.cues().iter().map(CueFile::file_name).collect()
    }

    #[test]
    fn test_missing_folder() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("Cunas");

        let err = CueLibrary::scan(&missing, today()).unwrap_err();
        assert!(matches!(err, CueError::MissingDirectory(_)));

        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_cue_with(&missing, today(), &mut rng).is_none());
    }

    #[test]
    fn test_non_audio_files_ignored() {
        let dir = folder(&["readme.txt", "cover.png", "promo.mp3"]);
        std::fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let library = CueLibrary::scan(dir.path(), today()).unwrap();
        assert_eq!(names(&library), vec!["promo.mp3"]);
    }

    #[test]
    fn test_no_audio_files() {
        let dir = folder(&["readme.txt"]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_cue_with(dir.path(), today(), &mut rng).is_none());
    }

    #[test]
    fn test_permanent_cues_ignore_date() {
        let dir = folder(&["a.mp3", "b.wav", "c.ogg"]);
        let far_future = NaiveDate::from_ymd_opt(2999, 1, 1).unwrap();

        let library = CueLibrary::scan(dir.path(), far_future).unwrap();
        assert_eq!(library.len(), 3);
    }

    #[test]
    fn test_expiry_today_and_yesterday() {
        let dir = folder(&["20250615_today.mp3", "20250614_yesterday.mp3"]);

        let library = CueLibrary::scan(dir.path(), today()).unwrap();
        assert_eq!(names(&library), vec!["20250615_today.mp3"]);
    }

    #[test]
    fn test_all_expired() {
        let dir = folder(&["20200101_old.mp3", "20210101_older_w4.wav"]);
        let library = CueLibrary::scan(dir.path(), today()).unwrap();
        assert!(library.is_empty());
        assert_eq!(library.total_weight(), 0);

        let mut rng = StdRng::seed_from_u64(7);
        assert!(library.choose(&mut rng).is_none());
        assert!(select_cue_with(dir.path(), today(), &mut rng).is_none());
    }

    #[test]
    fn test_total_weight() {
        let dir = folder(&["a_w3.mp3", "b.mp3", "c_w0.mp3"]);
        let library = CueLibrary::scan(dir.path(), today()).unwrap();
        assert_eq!(library.total_weight(), 5);
    }

    #[test]
    fn test_single_cue_always_chosen() {
        let dir = folder(&["only.ogg"]);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let cue = select_cue_with(dir.path(), today(), &mut rng).unwrap();
            assert_eq!(cue.file_name(), "only.ogg");
        }
    }

    #[test]
    fn test_choose_covers_every_bucket() {
        let library = CueLibrary::from_cues(vec![
            CueFile::from_path("a_w2.mp3").unwrap(),
            CueFile::from_path("b.mp3").unwrap(),
            CueFile::from_path("c_w4.mp3").unwrap(),
        ]);
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [0usize; 3];
        for _ in 0..700 {
            let cue = library.choose(&mut rng).unwrap();
            let index = library.cues().iter().position(|c| c == cue).unwrap();
            seen[index] += 1;
        }
        assert!(seen.iter().all(|&count| count > 0));
        // c (weight 4) should be drawn more than b (weight 1)
        assert!(seen[2] > seen[1]);
    }

    #[test]
    fn test_rescan_sees_new_files() {
        let dir = folder(&["first.mp3"]);
        assert_eq!(CueLibrary::scan(dir.path(), today()).unwrap().len(), 1);

        std::fs::write(dir.path().join("second.mp3"), b"").unwrap();
        assert_eq!(CueLibrary::scan(dir.path(), today()).unwrap().len(), 2);
    }
}

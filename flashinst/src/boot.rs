//! Device startup: storage first, then the game.

use fatfs::ReadWriteSeek;

use crate::diagnostics::DiagnosticSink;
use crate::installer::{FlashContentInstaller, Startup};
use crate::payload::Payload;

/// Hooks the firmware calls into the game.
pub trait ArcadeGame {
    /// Runs once after storage setup.
    fn setup(&mut self);

    /// Runs once per main loop iteration.
    fn frame(&mut self);
}

/// Runs storage setup, then [`ArcadeGame::setup`].
///
/// The game is started whether or not the install succeeded; the failure has
/// already been reported by the installer and is available in the result.
pub fn startup<D, S, G>(
    installer: &mut FlashContentInstaller<S>,
    device: D,
    payload: &Payload<'_>,
    game: &mut G,
) -> Startup<D>
where
    D: ReadWriteSeek,
    S: DiagnosticSink,
    G: ArcadeGame + ?Sized,
{
    let startup = installer.setup(device, payload);
    game.setup();
    startup
}

/// Drives `frames` iterations of the main loop.
pub fn run_frames<G: ArcadeGame + ?Sized>(game: &mut G, frames: usize) {
    for _ in 0..frames {
        game.frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::MountOptions;
    use std::io::Cursor;

    #[derive(Default)]
    struct Counter {
        setups: usize,
        frames: usize,
    }

    impl ArcadeGame for Counter {
        fn setup(&mut self) {
            self.setups += 1;
        }

        fn frame(&mut self) {
            self.frames += 1;
        }
    }

    #[test]
    fn test_game_runs_after_storage_failure() {
        let mut lines = Vec::new();
        let mut installer = FlashContentInstaller::with_sink(
            MountOptions::new().format_on_mount_failure(false),
            &mut lines,
        );
        let mut game = Counter::default();

        let started = startup(
            &mut installer,
            Cursor::new(vec![0xFF; 128 * 1024]),
            &Payload::game_js(),
            &mut game,
        );
        run_frames(&mut game, 3);

        assert!(started.volume.is_none());
        assert!(!started.outcome.is_installed());
        assert_eq!((game.setups, game.frames), (1, 3));
        drop(installer);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_startup_installs_bundled_script() {
        let mut installer = FlashContentInstaller::with_sink(MountOptions::new(), Vec::new());
        let mut game = Counter::default();
        let started = startup(
            &mut installer,
            Cursor::new(vec![0xFF; 256 * 1024]),
            &Payload::game_js(),
            &mut game,
        );

        let volume = started.volume.unwrap();
        assert_eq!(volume.read_file("/game.js").unwrap(), crate::GAME_JS);
        assert_eq!(game.setups, 1);
        assert!(installer.sink().is_empty());
    }
}

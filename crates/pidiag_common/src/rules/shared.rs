//! Rules every backend ends with: toolchain, network, permissions, disk,
//! compilation and miscellaneous host trouble that is not package-manager
//! specific.
//!
//! Remediation commands come from [`crate::backend::Remedies`] so the same
//! rule reads correctly on Debian and Arch hosts.

use super::{capture, Rule, Trigger};
use crate::backend::BackendKind;
use crate::diagnosis::Category;
use std::path::Path;

const GITHUB_UNREACHABLE: &str =
    r"Could not resolve host: github\.com|Failed to connect to github\.com port 443: Connection timed out";

const TRANSFER_FAILURE: &str = concat!(
    r"SSL/TLS handshake failure|total length mismatch|failed to establish connection|timeout",
    r"|connection reset by peer|name resolution failed|temporary failure in name resolution",
    r"|unable to establish SSL connection|connection closed at byte|read error at byte",
    r"|failed: No route to host|invalid range header|curl error|response status not successful",
    r"|download snap|dial tcp|lookup api\.snapcraft\.io",
    r"|fatal: unable to access 'https://github\.com.*': Failed to connect to github\.com port 443 after .* ms: Couldn't connect to server",
    r"|RPC failed; curl .* transfer closed with outstanding read data remaining",
    r"|RPC failed; curl .* GnuTLS recv error \(-9\): A TLS packet with unexpected length was received\.",
    r"|SSL error|failure when receiving data from the peer",
    r"|java\.net\.SocketTimeoutException: Read timed out",
);

const CORRUPT_ARCHIVE: &str = concat!(
    r"tar: Unexpected EOF in archive",
    r"|xz: \(stdin\): Unexpected end of input",
    r"|xz: \(stdin\): Compressed data is corrupt",
    r"|xz: \(stdin\): File format not recognized",
    r"|gzip: stdin: invalid compressed data--length error",
    r"|gzip: stdin: invalid compressed data--crc error",
    r"|corrupted filesystem tarfile in package archive: invalid tar header size field \(Invalid argument\)",
    r"|member 'data\.tar': internal gzip read error: '<fd:4>: incorrect data check",
    r"|error inflating zlib stream;",
);

const UNWRITABLE_DOWNLOAD: &str = r"errorCode=16 Failed to open the file (.*), cause: Permission denied";

const STALE_FLATPAK: &str = concat!(
    r"Error: Failed to read commit .* No such metadata object",
    r"|error: Failed to install org\.freedesktop\.Platform: Failed to read commit .* No such metadata object",
    r"|Error: Error deploying: .* No such metadata object",
);

pub fn rules() -> Vec<Rule> {
    let mut rules = cargo_rules();
    rules.extend(network_rules());
    rules.extend(host_rules());
    rules.extend(toolchain_rules());
    rules
}

fn cargo_rules() -> Vec<Rule> {
    vec![Rule::caption(
        "cargo-version-conflict",
        Trigger::Pattern(r"error: failed to select a version for the requirement.*version conflict"),
        Category::Package,
        "Rust compilation failed due to conflicting dependency requirements.\n\n\
         This typically happens when different parts of your project require incompatible versions of the same crate.\n\
         You may need to update the Cargo.toml file to resolve these conflicts or contact the application developer.",
    )]
}

fn network_rules() -> Vec<Rule> {
    vec![
        Rule::caption(
            "github-unreachable",
            Trigger::Pattern(GITHUB_UNREACHABLE),
            Category::Internet,
            "Failed to connect to github.com.\n\nCheck your internet connection and try again.",
        ),
        Rule::caption(
            "git-sideband-disconnect",
            Trigger::Any(&["fetch-pack: unexpected disconnect while reading sideband packet"]),
            Category::Internet,
            "The git command encountered this error: \"fetch-pack: unexpected disconnect while reading sideband packet\" \
             Check the stability of your Internet connection and try again. \n\n\
             If this keeps happening, see: https://stackoverflow.com/questions/66366582",
        ),
        Rule::caption(
            "git-missing-object",
            Trigger::Any(&["fatal: did not receive expected object"]),
            Category::Internet,
            "The git command encountered this error: \"fatal: did not receive expected object\" \
             Check the stability of your Internet connection and try again.\n\n\
             If this keeps happening, see: https://stackoverflow.com/questions/66366582",
        ),
        Rule::caption(
            "git-remote-hung-up",
            Trigger::Any(&["fatal: the remote end hung up unexpectedly"]),
            Category::Internet,
            "The git command encountered this error: \"fatal: the remote end hung up unexpectedly\" \
             Check the stability of your Internet connection and try again.\n\n\
             If this keeps happening, see: https://stackoverflow.com/questions/66366582",
        ),
        Rule::caption(
            "transfer-failure",
            Trigger::Pattern(TRANSFER_FAILURE),
            Category::Internet,
            "The git command encountered this error: \"SSL/TLS handshake failure\" \
             Check the stability of your Internet connection and try again.",
        ),
        Rule::caption(
            "curl-http2-internal-error",
            Trigger::Pattern(r"curl: \(.*\) HTTP/2 stream .* was not closed cleanly: INTERNAL_ERROR \(err .*\)"),
            Category::Internet,
            "Download failed due to an internal curl error. This could be an internet issue or hardware problem. \n\
             If you are overclocking, try reverting to stock clocks. Additionally, check your internet connection and firewall, then try again.",
        ),
        Rule::caption(
            "aria2-authorization",
            Trigger::Any(&["errorCode=24 Authorization failed."]),
            Category::Internet,
            "The curl command encountered this error: \"errorCode=24 Authorization failed.\" \
             Check the stability of your Internet connection and try again.",
        ),
        Rule::caption(
            "flathub-resolve",
            Trigger::Pattern(r"flathub: Error resolving .dl\.flathub\.org."),
            Category::Internet,
            "The flathub command encountered this error: \"flathub: Error resolving .dl.flathub.org.\" \
             Check the stability of your Internet connection and try again.",
        ),
        Rule::caption(
            "tls-terminated",
            Trigger::Pattern(
                r"The TLS connection was non-properly terminated\.|Can't load uri .* Unacceptable TLS certificate",
            ),
            Category::Internet,
            "The TLS connection was non-properly terminated. Check the stability of your Internet connection and try again.",
        ),
        Rule::caption(
            "gnutls-pull",
            Trigger::Any(&["GnuTLS recv error (-54): Error in the pull function."]),
            Category::Internet,
            "Download failed due to an issue with your internet, not Pi-Apps. The connection was terminated before the download completed. \n\n\
             This can be caused by your or your ISPs configured firewalls. \n\n\
             Here are some suggested mitigations for your bad internet connection: \
             https://stackoverflow.com/questions/38378914/how-to-fix-git-error-rpc-failed-curl-56-gnutls",
        ),
        Rule::caption(
            "java-connection-refused",
            Trigger::Any(&["java.net.ConnectException: Connection refused"]),
            Category::Internet,
            "Download failed. Check your internet connection and firewall, then try again.",
        ),
        Rule::caption(
            "crate-not-found",
            Trigger::Pattern(r"error: failed to get .*? as a dependency.*no matching package named"),
            Category::Internet,
            "Rust compilation failed because a required crate dependency was not found.\n\n\
             This could be due to:\n\
             1. Network connectivity issues when fetching crates\n\
             2. The crate being removed from crates.io\n\
             3. Version incompatibility issues\n\n\
             Try running 'cargo clean' and attempt the installation again with an active internet connection.",
        ),
        Rule::caption(
            "cargo-network",
            Trigger::Pattern(
                r"error: failed to fetch from.*could not connect to server|error: failed to fetch.*Network is unreachable",
            ),
            Category::Internet,
            "Cargo couldn't connect to the crates.io registry or other dependency sources.\n\n\
             Please check your internet connection and try again. If you're behind a proxy, make sure it's configured correctly for Cargo.",
        ),
        Rule::caption(
            "waydroid-image-hash",
            Trigger::Any(&["ERROR: Downloaded system image hash doesn't match, expected"]),
            Category::Internet,
            "Waydroid OS image download failed. Check your internet connection and firewall, then try again.",
        ),
    ]
}

fn host_rules() -> Vec<Rule> {
    vec![
        Rule::render(
            "kernel-module-missing",
            Trigger::Pattern(r"modprobe: FATAL: Module .* not found in directory"),
            Category::System,
            |s| {
                format!(
                    "Something is wrong with the kernel modules. Try rebooting if your kernel was upgraded. \n\n\
                     Otherwise, try reinstalling the kernel using this command: \n\
                     {} \n\n\
                     See this forum thread: https://raspberrypi.org/forums/viewtopic.php?t=262963",
                    s.backend.remedies.kernel_reinstall
                )
            },
        ),
        Rule::render(
            "appmenu-gtk-module",
            Trigger::Any(&["Failed to load module \"appmenu-gtk-module\""]),
            Category::System,
            |s| {
                format!(
                    "This error occurred: Failed to load module \"appmenu-gtk-module\" \n\n\
                     Try installing the appmenu packages with this command: \n\
                     {} \n\n\
                     And if that doesn't work, try Googling the errors or reach out to Pi-Apps developers for help.",
                    s.backend.remedies.appmenu
                )
            },
        ),
        Rule::caption(
            "gnupg-missing",
            Trigger::When(|s| {
                s.backend.kind == BackendKind::Apt
                    && s.contains("E: gnupg, gnupg2 and gnupg1 do not seem to be installed, but one of them is required for this operation")
            }),
            Category::System,
            "Repository-signing failed because gnpug is missing. This is installed by default on most systems, but on yours it's missing for some reason. \n\n\
             Try installing gnupg with this command: \n\
             sudo apt install gnupg",
        ),
        Rule::caption(
            "dbus-unreachable",
            Trigger::Pattern(
                r"error: Unable to connect to system bus|error: Message recipient disconnected from message bus without replying|Failed to connect to bus: Host is down",
            ),
            Category::System,
            "Something is wrong with your dbus connection. \n\n\
             Try rebooting. \n\n\
             Make sure systemd is setup correctly. \n\n\
             If that doesn't help please read through this: https://github.com/WhitewaterFoundry/Fedora-Remix-for-WSL/issues/81 \n\n\
             You may want to reinstall your OS. \n\n\
             Also consider reaching out to Pi-Apps developers for help.",
        ),
        Rule::render(
            "i18n-supported-missing",
            Trigger::Any(&["cat: /usr/share/i18n/SUPPORTED: No such file or directory"]),
            Category::System,
            |s| {
                format!(
                    "Your system is missing the /usr/share/i18n/SUPPORTED file. \n\n\
                     Try reinstalling the package that provides it: \n\
                     {}",
                    s.backend.remedies.locales
                )
            },
        ),
        Rule::render(
            "not-in-sudoers",
            Trigger::Any(&["is not in the sudoers file.  This incident will be reported."]),
            Category::System,
            |s| {
                format!(
                    "Unable to use the sudo command - the current user {} is not allowed to use it. \n\n\
                     Please enable passwordless sudo or switch to a more privelaged user-account. \n\n\
                     See: https://www.tecmint.com/fix-user-is-not-in-the-sudoers-file-the-incident-will-be-reported-ubuntu/",
                    s.host.user
                )
            },
        ),
        Rule::caption(
            "sudo-wrong-password",
            Trigger::Pattern(r"sudo: .* incorrect password attempts"),
            Category::System,
            "Process could not complete because you failed to type in the correct sudo password. \n\n\
             Try again, and consider enabling passwordless sudo.",
        ),
        Rule::caption(
            "sudo-misconfigured",
            Trigger::Any(&[
                "sudo: unable to resolve host",
                "sudo: no valid sudoers sources found, quitting",
            ]),
            Category::System,
            "Process could not complete because your sudo command is incorrectly set up. \n\n\
             For solutions, see: https://askubuntu.com/a/59517",
        ),
        Rule::caption(
            "truncated-object-file",
            Trigger::Any(&["cpp.o: file not recognized: file truncated"]),
            Category::System,
            "Compiling failed. Try again, but please reach out to Pi-Apps developers for help if this same error keeps occurring.",
        ),
        Rule::caption(
            "corrupt-archive",
            Trigger::Pattern(CORRUPT_ARCHIVE),
            Category::System,
            "Extraction failed. Most likely this was a corrupted download, so please try again. \n\n\
             If this problem continues occurring, please reach out to the Pi-Apps developers for help.",
        ),
        Rule::render(
            "xz-missing",
            Trigger::Any(&["xz: Cannot exec: No such file or directory"]),
            Category::System,
            |s| {
                format!(
                    "Extraction failed because XZ is not installed. \n\n\
                     To install XZ, run this in a terminal: \n\
                     {}",
                    s.backend.remedies.xz
                )
            },
        ),
        Rule::render(
            "aria2-library",
            Trigger::When(|s| match s.backend.kind {
                BackendKind::Pacman => s.contains("aria2c: error while loading shared libraries"),
                _ => s.contains(
                    "aria2c: error while loading shared libraries: /lib/arm-linux-gnueabihf/libaria2.so.0: unexpected reloc type 0xc8",
                ),
            }),
            Category::System,
            |s| {
                format!(
                    "Download failed because aria2c could not load the libaria2 library. \n\n\
                     Try reinstalling the package: \n\
                     {}",
                    s.backend.remedies.aria2
                )
            },
        ),
        Rule::render(
            "download-folder-unwritable",
            Trigger::Pattern(UNWRITABLE_DOWNLOAD),
            Category::System,
            |s| {
                let folder = capture(UNWRITABLE_DOWNLOAD, s.log)
                    .map(|file| parent_dir(&file))
                    .unwrap_or_else(|| "<unknown folder>".to_string());
                format!("Download failed because this folder was unable to be written: \n{}", folder)
            },
        ),
        Rule::caption(
            "reinstall-not-downloadable",
            Trigger::Pattern(r"Reinstallation of .* is not possible, it cannot be downloaded\."),
            Category::System,
            "Your APT setup has been corrupted somehow. \n\n\
             This was most likely caused by an unexpected power loss or shutdown while packages were being reinstalled or upgraded. \n\n\
             Fixing this will not be easy and it may not be worth your time. Reflashing the SD card may be faster. \n\n\
             First try running: \n\
             sudo dpkg --configure -a \n\n\
             If you still get APT errors, it *might* help to remove the apt folder and upgrade: \n\
             sudo rm -rf /var/lib/apt \n\
             sudo apt update \n\n\
             See: https://forums.raspberrypi.com/viewtopic.php?t=275994",
        ),
        Rule::caption(
            "structure-needs-cleaning",
            Trigger::Any(&["Structure needs cleaning"]),
            Category::System,
            "Your have encountered the dreaded \"Structure needs cleaning\" error. This indicates file-corruption caused by improperly shutting down your computer. You are lucky your computer booted at all.\n\n\
             You can try scheduling a filesystem cleanup: \n\
             sudo touch /forcefsck \n\n\
             After running that command, reboot and see if that fixes the problem. \n\n\
             If that doesn't work, then now is the time to restore your backup. Oh, you don't have one? Then you will have to re-flash your SD card and start over. \
             And maybe consider keeping regular backups to avoid this unpleasant situation next time.",
        ),
        Rule::render(
            "vchi-init-failed",
            Trigger::Any(&["VCHI initialization failed"]),
            Category::System,
            |s| {
                format!(
                    "You have encountered the 'VCHI initialization failed' error. This means that a program was not allowed to display something to the screen. \n\n\
                     You can try to fix the error by adding your user to the video group. Run this command in a terminal: \n\
                     sudo usermod -a -G video {} \n\n\
                     See: https://raspberrypi.stackexchange.com/a/8423/107602",
                    s.host.user
                )
            },
        ),
        Rule::caption(
            "flatpak-stale-download",
            Trigger::Pattern(STALE_FLATPAK),
            Category::System,
            "Flatpak failed to install something due to a past incompleted download. \n\n\
             To repair it, please run this command in a terminal: \n\
             flatpak repair --user \n\n\
             See: https://github.com/flatpak/flatpak/issues/3479",
        ),
        Rule::caption(
            "disk-full",
            Trigger::Pattern(
                r"No space left on device|Not enough disk space to complete this operation|You don't have enough free space in|Cannot write to .* \(Success\)\.",
            ),
            Category::System,
            "Your system has insufficient disk space.\n\nPlease free up some space, then try again.",
        ),
        Rule::render(
            "autostart-permissions",
            Trigger::Pattern(r": line .*: \$HOME/\.config/autostart/.*\.desktop: Permission denied"),
            Category::System,
            |s| {
                format!(
                    "Failed to create an autostart entry because the folder permissions are incorrect.\n\n\
                     This was most likely caused by running an install script as root in the past. Don't do that.\n\n\
                     You can fix the folder's permissions by running this command in a terminal:\n\
                     sudo chown {user}:{user} ~/.config/autostart",
                    user = s.host.user
                )
            },
        ),
        Rule::render(
            "pip-cache-ownership",
            Trigger::Pattern(
                r"The directory '(\$HOME|\$\{HOME\}|/home/[^/]+)/\.cache/pip' or its parent directory is not owned by the current user",
            ),
            Category::System,
            |s| {
                format!(
                    "The Python package manager (pip3) could not make changes to its own cache folder: {home}/.cache/pip\n\n\
                     Most likely, you tried running pip3 with sudo in the past, or you tried running a Pi-Apps script with sudo in the past. (not recommended!)\n\n\
                     To fix this, run this command: \n\
                     sudo chown -R {user}:{user} {home}/.cache/pip",
                    home = s.host.home,
                    user = s.host.user
                )
            },
        ),
        Rule::render(
            "home-unwritable",
            Trigger::Pattern(
                r"mkdir: cannot create directory .*/home/[^/]+/pi-apps-.*: Permission denied|rm: cannot remove .*/home/[^/]+/.*: Permission denied",
            ),
            Category::System,
            |s| {
                format!(
                    "Your HOME directory cannot be written to by the current user. \n\n\
                     Most likely, you ran some command that made your HOME directory root owned.\n\n\
                     To fix this, run this command: \n\
                     sudo chown -R {user}:{user} $HOME",
                    user = s.host.user
                )
            },
        ),
        Rule::caption(
            "linker-segfault",
            Trigger::Any(&["collect2: fatal error: ld terminated with signal 11 [Segmentation fault]"]),
            Category::System,
            "Failed to compile! The error was: \"collect2: fatal error: ld terminated with signal 11 [Segmentation fault]\"\n\n\
             This usually indicates a hardware problem, most likely with your RAM. Try rebooting your computer.",
        ),
        Rule::render(
            "lsb-release-broken",
            Trigger::When(|s| {
                s.contains("ModuleNotFoundError: No module named 'lsb_release'")
                    || (s.backend.kind == BackendKind::Pacman
                        && s.contains("lsb_release: command not found"))
            }),
            Category::System,
            |s| {
                let mut caption = format!(
                    "Your lsb_release command seems to be incompletely installed. Try running this command to fix it: \n{}",
                    s.backend.remedies.lsb_release
                );
                if s.backend.kind == BackendKind::Pacman {
                    caption.push_str(
                        "\n\nNote: Arch Linux doesn't use LSB by default, so some scripts expecting lsb_release may need adjustment.",
                    );
                }
                caption
            },
        ),
        Rule::caption(
            "compiler-oom-killed",
            Trigger::Any(&["c++: fatal error: Killed signal terminated program cc1plus"]),
            Category::System,
            "Compiling failed because cc1plus was killed due to insufficient RAM.\n\n\
             Please try installing the application again, but this time keep all other programs closed to preserve more free RAM.\n\
             If this error persists, try installing the More RAM app from Pi-Apps. Find it in the Tools category.",
        ),
        Rule::caption(
            "snapd-unsupported",
            Trigger::Any(&["error: system does not fully support snapd: cannot mount squashfs image"]),
            Category::System,
            "Snap failed to fully install due to this error: 'error: system does not fully support snapd: cannot mount squashfs image'\n\n\
             Your Operating System is likely custom to some extent, or otherwise unusual to be having this issue. \
             Try searching the internet. Include your setup and the error message.",
        ),
        Rule::caption(
            "veracrypt-mounted",
            Trigger::Any(&["Error: All VeraCrypt volumes must be dismounted first."]),
            Category::System,
            "Error encountered: 'Error: All VeraCrypt volumes must be dismounted first.'\n\n\
             You need to do as it says and unmount any VeraCrypt volumes first. Rebooting might help.",
        ),
        Rule::caption(
            "squashfs-mount",
            Trigger::Any(&["Failed to mount squashfs image"]),
            Category::System,
            "Failed to mount squashfs image. This is most likely due to a failed installation of a package. Try reinstalling the package.",
        ),
    ]
}

fn toolchain_rules() -> Vec<Rule> {
    vec![
        Rule::caption(
            "rustc-too-old",
            Trigger::Pattern(r"error: the current.*rustc .* is older than the minimum version required"),
            Category::System,
            "Rust compilation failed because your Rust compiler (rustc) is too old for this project.\n\n\
             You need to update your Rust installation. Run the following command:\n\
             rustup update",
        ),
        Rule::render(
            "cargo-home-permissions",
            Trigger::Pattern(r"failed to get metadata for.*: permission denied: .*\.cargo"),
            Category::System,
            |s| {
                format!(
                    "Cargo couldn't access its own cache directory due to permission issues.\n\n\
                     This likely happened because you ran cargo with sudo in the past. To fix this, run:\n\
                     sudo chown -R {user}:{user} {home}/.cargo",
                    user = s.host.user,
                    home = s.host.home
                )
            },
        ),
        Rule::caption(
            "rustc-out-of-memory",
            Trigger::Pattern(
                r"LLVM ERROR: out of memory|rustc.*internal compiler error.*out of memory|killed by the OOM killer",
            ),
            Category::System,
            "Rust compilation failed because the system ran out of memory.\n\n\
             Rust compilation can be memory-intensive, especially with optimizations enabled. Try:\n\
             1. Close other applications to free up memory\n\
             2. Add swap space to your system\n\
             3. Try compiling with fewer parallel jobs: CARGO_BUILD_JOBS=1 cargo build\n\
             4. If on Raspberry Pi, consider installing the More RAM app from Pi-Apps",
        ),
        Rule::caption(
            "rust-target",
            Trigger::Pattern(
                r"error: failed to run custom build command for.*cross-compil|error: failed to run rustc to learn about target-specific information",
            ),
            Category::System,
            "Rust compilation failed due to cross-compilation or target architecture issues.\n\n\
             This could be because:\n\
             1. You're missing required target-specific toolchains\n\
             2. The project doesn't support your hardware architecture\n\n\
             Try installing the required rustc target with: rustup target add <target>",
        ),
    ]
}

/// Directory part of a path as printed in a log line
fn parent_dir(file: &str) -> String {
    match Path::new(file).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.display().to_string(),
        _ => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::command_exec::NullRunner;
    use crate::host::HostInfo;
    use crate::rules::{evaluate, Scope};

    fn diagnose(kind: BackendKind, log: &str) -> crate::diagnosis::Diagnosis {
        let mut host = HostInfo::blank(Path::new("/nonexistent-root"));
        host.user = "pi".to_string();
        host.home = "/home/pi".to_string();
        let mut scope = Scope::new(log, &host, Backend::new(kind), &NullRunner, false);
        evaluate(&rules(), &mut scope);
        scope.diagnosis
    }

    #[test]
    fn test_escaped_alternation_matches_each_branch() {
        let d = diagnose(BackendKind::Apt, "fatal: Failed to connect to github.com port 443: Connection timed out");
        assert_eq!(d.category, Category::Internet);
        assert!(d.captions[0].starts_with("Failed to connect to github.com."));
    }

    #[test]
    fn test_literal_parentheses_in_archive_errors() {
        let d = diagnose(BackendKind::Generic, "xz: (stdin): Compressed data is corrupt");
        assert_eq!(d.captions.len(), 1);
        assert!(d.captions[0].starts_with("Extraction failed."));
    }

    #[test]
    fn test_user_and_home_interpolated() {
        let d = diagnose(
            BackendKind::Apt,
            "The directory '/home/pi/.cache/pip' or its parent directory is not owned by the current user",
        );
        assert!(d.captions[0].contains("sudo chown -R pi:pi /home/pi/.cache/pip"));
    }

    #[test]
    fn test_remedy_follows_backend() {
        let log = "xz: Cannot exec: No such file or directory";
        assert!(diagnose(BackendKind::Apt, log).captions[0].ends_with("sudo apt-get install xz-utils"));
        assert!(diagnose(BackendKind::Pacman, log).captions[0].ends_with("sudo pacman -S xz"));
    }

    #[test]
    fn test_gnupg_only_on_apt() {
        let log = "E: gnupg, gnupg2 and gnupg1 do not seem to be installed, but one of them is required for this operation";
        assert_eq!(diagnose(BackendKind::Apt, log).captions.len(), 1);
        assert!(diagnose(BackendKind::Pacman, log).captions.is_empty());
    }

    #[test]
    fn test_pacman_lsb_command_not_found() {
        let log = "bash: lsb_release: command not found";
        assert!(diagnose(BackendKind::Apt, log).captions.is_empty());
        let d = diagnose(BackendKind::Pacman, log);
        assert!(d.captions[0].contains("sudo pacman -S lsb-release"));
        assert!(d.captions[0].contains("Arch Linux doesn't use LSB"));
    }

    #[test]
    fn test_unwritable_download_folder() {
        let d = diagnose(
            BackendKind::Generic,
            "errorCode=16 Failed to open the file /home/pi/Downloads/app.deb, cause: Permission denied",
        );
        assert!(d.captions[0].ends_with("\n/home/pi/Downloads"));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/tmp/x/y.deb"), "/tmp/x");
        assert_eq!(parent_dir("y.deb"), ".");
    }
}

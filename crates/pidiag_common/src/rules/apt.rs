//! apt/dpkg rule table
//!
//! Ordered from infrastructure (repositories, dpkg state) to individual
//! packages, so the most specific category is the one that sticks.

use super::{generic, passthrough, pattern, Finding, Rule, Scope, Trigger};
use crate::arch;
use crate::diagnosis::Category;
use crate::enrichment::{self, UNMET_MARKER};
use crate::repo_files;
use tracing::debug;

/// Caption for a package that needs reinstalling
macro_rules! troubled_package {
    ($pkg:literal) => {
        concat!(
            "The ",
            $pkg,
            " package on your system is causing problems. \n\nMaybe reinstalling this package would help?"
        )
    };
    ($pkg:literal, encountered) => {
        concat!(
            "The ",
            $pkg,
            " package on your system encountered a problem. \n\nMaybe reinstalling this package would help?"
        )
    };
}

const SHARED_OVERWRITE: &str =
    r"trying to overwrite shared .*, which is different from other instances of package";

pub fn rules() -> Vec<Rule> {
    let mut rules = repository_rules();
    rules.extend(dpkg_rules());
    rules.push(passthrough::unmet_rule());
    rules.push(Rule::probe(
        "shared-file-overwrite",
        Trigger::Pattern(SHARED_OVERWRITE),
        |s| {
            let line = pattern(SHARED_OVERWRITE)?;
            Some(enrichment::investigate_overwrite(s, &line))
        },
    ));
    rules.push(Rule::caption(
        "phantom-downgrade",
        Trigger::When(|s| {
            s.contains("E: Packages were downgraded and -y was used without --allow-downgrades.")
                && !s.contains("The following packages will be DOWNGRADED:")
        }),
        Category::System,
        "Apt is reporting conflicting information that packages would be downgraded as a result of this standard apt install yet no packages are listed as to be downgraded. \
         This is likely an issue with your linux distribution. Please contact the appropriate maintainer for assistance.",
    ));
    rules.extend(repo_files::rules());
    rules.push(Rule::caption(
        "bad-message-on-remove",
        Trigger::Pattern(r"unable to securely remove '.*': Bad message"),
        Category::System,
        "Got a 'Bad message' error when trying to remove a file in an unrelated package. This is not a Pi-Apps issue, but it may indicate hardware failure or disk corruption on your computer.\n\n\
         Please click the retry button to see if this keeps occuring, and if it does, try searching the internet for your specific error message.\n\n\
         Also it is advisable to run fsck on your root partition to try to work around disk corruption.\n\n\
         Open an issue on Pi-Apps if all else fails, but we will probably tell you the same things as are written here.",
    ));
    rules.extend(package_rules());
    rules.push(Rule::probe(
        "backports-conflict",
        Trigger::All(&["E: Unable to correct problems, you have held broken packages.", UNMET_MARKER]),
        enrichment::investigate_backports,
    ));
    rules
}

fn repository_rules() -> Vec<Rule> {
    vec![
        Rule::caption(
            "faulty-repository",
            Trigger::Any(&["E: The repository", "sources.list entry misspelt", "component misspelt in"]),
            Category::System,
            concat!(
                "APT reported a faulty repository, and you must fix it before Pi-Apps will work.\n\n",
                "To delete the repository:\n",
                "Remove the relevant line from /etc/apt/sources.list file or delete one file in\n",
                "the /etc/apt/sources.list.d folder.\n\n",
                "sources.list requires root permissions to edit: sudo mousepad /path/to/file",
            ),
        ),
        Rule::caption(
            "unsigned-repository",
            Trigger::Any(&["NO_PUBKEY", " is no longer signed."]),
            Category::System,
            "APT reported an unsigned repository. This has to be solved before APT or Pi-Apps, will work.\n\n\
             If you're not sure what to do, you can try to fix the problem by running this command in a terminal:\n\
             sudo apt update 2>&1 | sed -ne 's/.*NO_PUBKEY //p' | while read key; do if ! [[ ${keys[*]} =~ \"$key\" ]]; then \
             sudo apt-key adv --keyserver keyserver.ubuntu.com --recv-keys \"$key\"; keys+=(\"$key\"); fi; done",
        ),
        Rule::caption(
            "unresolvable-repository",
            Trigger::When(unresolvable_repository),
            Category::Internet,
            "APT reported an unresolvable repository.\n\nCheck your Internet connection and try again.",
        ),
        Rule::caption(
            "double-configured-repository",
            Trigger::Any(&["is configured multiple times in"]),
            Category::System,
            "APT reported a double-configured repository, and you must fix it to fix Pi-Apps.\n\n\
             To delete the repository:\n\
             Remove the relevant line from /etc/apt/sources.list file or delete the file in\n\
             the /etc/apt/sources.list.d folder.\n\n\
             sources.list requires root permissions to edit: sudo mousepad /path/to/file",
        ),
        Rule::caption(
            "conflicting-distribution",
            Trigger::Any(&["W: Conflicting distribution: "]),
            Category::System,
            "APT reported a conflicting repository.\n\n\
             Read the installation errors, then look through /etc/apt/sources.list and /etc/apt/sources.list.d, making changes as necessary.\n\n\
             Perhaps doing a Google search for the exact error you received would help.",
        ),
        Rule::caption(
            "release-not-yet-valid",
            Trigger::Pattern(r"Release file for .* is not valid yet"),
            Category::System,
            "APT reported a repository whose release file becomes valid in the future.\n\n\
             This is probably because your system time is set incorrectly.",
        ),
        Rule::caption(
            "release-expired",
            Trigger::Pattern(r"Release file for .* is expired"),
            Category::System,
            "APT reported a repository whose release file was invalidated in the past.\n\
             Please check that your system clock is set correctly, and if it is, check if the repository is kept updated or if its developers abandoned it.\n\n\
             If you think think you shouldn't see this error, you can try refreshing APT with these commands:\n\
             sudo rm -rf /var/lib/apt\n\
             sudo apt update",
        ),
        Rule::caption(
            "sources-typo",
            Trigger::Any(&["sources.list entry misspelt"]),
            Category::System,
            "APT reported a typo in the sources.list file.\n\
             You must look around in /etc/apt/sources.list and /etc/apt/sources.list.d and fix the typo.\n",
        ),
        Rule::caption(
            "package-cache-corrupted",
            Trigger::Any(&["E: The package cache file is corrupted"]),
            Category::System,
            "APT found something wrong with a package list file.\n\
             Perhaps this link would help: https://askubuntu.com/questions/939345/the-package-cache-file-is-corrupted-error",
        ),
        Rule::caption(
            "local-packages-list-missing",
            Trigger::Any(&["E: Could not open file /var/lib/apt/lists/_tmp_pi-apps-local-packages_._Packages"]),
            Category::System,
            "APT reported the pi-apps-local-packages list as missing.\n\
             The Pi-Apps developers have been receiving a few of these errors recently, but we can't figure out what the problem is without your help. \
             Could you please reach out so we can solve this?",
        ),
    ]
}

fn unresolvable_repository(s: &Scope) -> bool {
    const FETCH_FAILURES: &[&str] = &[
        "Could not resolve",
        "Failed to fetch",
        "Temporary failure resolving",
        "Internal Server Error",
    ];
    s.contains("APT reported these errors:")
        && (FETCH_FAILURES.iter().any(|f| s.contains(f))
            || pattern(r"404 .*Not Found").map(|re| re.is_match(s.log)).unwrap_or(false))
}

fn dpkg_rules() -> Vec<Rule> {
    vec![
        Rule::caption(
            "broken-package",
            Trigger::Any(&["--fix-broken", "needs to be reinstalled"]),
            Category::Package,
            "APT reported a broken package.\n\nPlease run this command: sudo apt --fix-broken install",
        ),
        Rule::caption(
            "dpkg-interrupted",
            Trigger::Any(&["dpkg --configure -a"]),
            Category::System,
            "Before dpkg, apt, or Pi-Apps will work, dpkg needs to repair your system.\n\n\
             Please run this command: sudo dpkg --configure -a",
        ),
        Rule::probe(
            "unsupported-foreign-architecture",
            Trigger::When(|s| arch::mentions_foreign_index(s.log)),
            unsupported_foreign_architectures,
        ),
        Rule::caption(
            "inconsistent-package-state",
            Trigger::Any(&["package is in a very bad inconsistent state;"]),
            Category::System,
            "Something is wrong with another package on your system.\n\n\
             Refer to this information while troubleshooting: https://askubuntu.com/questions/148715",
        ),
        Rule::caption(
            "dpkg-empty-fgets",
            Trigger::Any(&["dpkg: error: fgets gave an empty string from"]),
            Category::System,
            "Something strange is going on with your system and dpkg won't work.\n\n\
             Perhaps this link will help: https://askubuntu.com/questions/1293709/weird-error-when-trying-to-install-packages-with-apt",
        ),
        Rule::caption(
            "apt-too-old-for-releaseinfo-change",
            Trigger::Any(&["Command line option --allow-releaseinfo-change is not understood"]),
            Category::System,
            "The Debian Project recently upgraded from Buster to version Bullseye. As a result, all Raspberry Pi OS Buster users will receive APT errors saying the repositories changed from 'stable' to 'oldstable'. \n\n\
             This error broke pi-apps. To fix it, the Pi-Apps developers added something to the 'sudo apt update' command: --allow-releaseinfo-change. \n\n\
             This flag allows the repository migration to succeed, thereby allowing Pi-Apps to work again.\n\n\
             Unfortunately for you, your operating system is too old for apt to understand this flag we added. Please upgrade your operating system for a better experience. \
             Raspbian Stretch is unsupported and many apps will not install.\n\n\
             Please flash your SD card with the latest release of Raspberry Pi OS: https://www.raspberrypi.org/software",
        ),
        Rule::caption(
            "corrupt-lzma-download",
            Trigger::Any(&["lzma error: compressed data is corrupt"]),
            Category::Internet,
            "A package failed to install because it appears corrupted. (buggy download?)",
        ),
        Rule::caption(
            "dpkg-lock",
            Trigger::Any(&["E: Could not get lock"]),
            Category::System,
            "Some other apt-get/dpkg process is running (E: Could not get lock). Wait for that one to finish, then try again.",
        ),
        Rule::caption(
            "dpkg-updates-dir-missing",
            Trigger::Any(&["dpkg: error: cannot scan updates directory"]),
            Category::System,
            "What did you do to your system? The '/var/lib/dpkg/updates' folder is missing. \n\n\
             You can try creating the folder with this command: \n\
             sudo mkdir -p /var/lib/dpkg/updates",
        ),
        Rule::caption(
            "suite-value-changed",
            Trigger::Pattern(r"E: Repository .* changed its 'Suite' value"),
            Category::System,
            "One or more APT repositories on your system have changed Suite values. Usually this occurs when a new version of Debian is released every two years. \n\n\
             Pi-Apps should work around this error, but somehow it did not. \n\n\
             Please run this command in a terminal: sudo apt update --allow-releaseinfo-change",
        ),
        Rule::caption(
            "mirror-sync",
            Trigger::Pattern(r"E: Failed to fetch .* File has unexpected size .* Mirror sync in progress\?"),
            Category::System,
            "APT encountered a repository with a file that is of incorrect size. This can be caused by a periodic mirror sync, or maybe the repository is faulty. \n\n\
             In any case, Pi-Apps cannot work until you solve this issue. Try disabling any 3rd-party APT repos first, and if that doesn't work then ask for help.",
        ),
        Rule::caption(
            "invalid-default-release",
            Trigger::Any(&["E: The value 'stable' is invalid for APT::Default-Release as such a release is not available in the sources"]),
            Category::System,
            "APT encountered an issue reading a source file for a repository. Most likely, you were trying to change your sources and did not format the file correctly. \n\n\
             Please check your sources.list file and try again.",
        ),
        Rule::caption(
            "dkms-package-failed",
            Trigger::Pattern(r"dpkg: error processing package .*-dkms"),
            Category::System,
            "A DKMS (Dynamic Kernel Module Support) package failed to install and has prevented apt from working correctly. \
             This is likely an issue with your distribution and you should report it wherever applicable. \n\n\
             Pi-Apps cannot work until you solve this issue. If you do not need the problematic package, you can remove it with apt to solve the issue.",
        ),
    ]
}

fn unsupported_foreign_architectures(s: &mut Scope) -> Option<Finding> {
    let native = s.host.native_arch.as_deref()?;
    let named = arch::extract_foreign_architectures(s.log);
    let unsupported = arch::unsupported_architectures(native, &named, s.host.cpu_modes);
    debug!("foreign architectures {:?}, unsupported {:?}", named, unsupported);
    if unsupported.is_empty() {
        return None;
    }
    Some(Finding::new(
        Category::System,
        format!(
            "APT is failing because you have added unsupported foreign architecture(s): {}\n\n\
             Your system architecture ({}) does not support these architectures. \
             This commonly happens when users add i386 architecture to ARM systems or vice versa.\n\n\
             To fix this, remove the unsupported architecture(s) with these commands:\n\
             {}\n\n\
             Then run: sudo apt update",
            unsupported.join(", "),
            native,
            arch::remove_architecture_commands(&unsupported)
        ),
    ))
}

fn package_rules() -> Vec<Rule> {
    let mut rules = generic::kernel_module_rules();
    rules.push(Rule::caption(
        "post-install-script",
        Trigger::Pattern(r"installed .* post-installation script subprocess returned error exit status"),
        Category::Package,
        "A package failed to install because it encountered an error during the post-installation script.",
    ));
    rules.push(generic::vulkan_hook_rule());
    rules.extend([
        Rule::caption(
            "dphys-swapfile",
            Trigger::Any(&["error processing package dphys-swapfile"]),
            Category::Package,
            "Before dpkg, apt, or Pi-Apps will work, dphys-swapfile must be fixed. \n\n\
             Try Googling the above errors, or ask the Pi-Apps developers for help.",
        ),
        Rule::caption(
            "boot-firmware",
            Trigger::Any(&["missing /boot/firmware, did you forget to mount it", "u-boot-rpi"]),
            Category::Package,
            "Package(s) failed to install because your boot drive is not working. \n\n\
             You must fix the u-boot-rpi package before dpkg, apt, or Pi-Apps will work.",
        ),
        Rule::caption(
            "files-list-final-newline",
            Trigger::Pattern(r"files list file for package .* is missing final newline"),
            Category::Package,
            "Before dpkg, apt, or Pi-Apps will work, your system must be repaired. \n\n\
             Perhaps this link will help: https://askubuntu.com/questions/909719/dpkg-unrecoverable-fatal-error-aborting-files-list-file-for-package-linux-ge",
        ),
        Rule::caption(
            "raspberrypi-kernel",
            Trigger::Any(&["raspberrypi-kernel package post-installation script subprocess returned error exit status"]),
            Category::Package,
            "The raspberrypi-kernel package on your system is causing problems. \n\n\
             Pi-Apps, dpkg and APT won't work properly until the problem is fixed. \n\n\
             https://www.raspberrypi.org/forums",
        ),
        Rule::caption(
            "raspberrypi-bootloader",
            Trigger::Any(&["raspberrypi-bootloader package pre-installation script subprocess returned error exit status"]),
            Category::Package,
            "The raspberrypi-bootloader package on your system is causing problems. \n\n\
             Pi-Apps, dpkg and APT won't work properly until the problem is fixed. \n\n\
             https://www.raspberrypi.org/forums",
        ),
        Rule::caption(
            "nginx-full",
            Trigger::Any(&["error processing package nginx-full"]),
            Category::Package,
            troubled_package!("nginx-full", encountered),
        ),
        Rule::caption(
            "libwine-development",
            Trigger::Any(&["libwine-development:arm64 package post-installation script subprocess returned error exit status"]),
            Category::Package,
            troubled_package!("libwine-development", encountered),
        ),
        Rule::caption(
            "firmware-microbit",
            Trigger::Any(&["installed firmware-microbit-micropython-dl package post-installation script subprocess returned error exit status 1"]),
            Category::Package,
            troubled_package!("firmware-microbit-micropython-dl", encountered),
        ),
        Rule::caption(
            "flash-kernel",
            Trigger::Any(&["installed flash-kernel package post-installation script subprocess returned error exit status 1"]),
            Category::Package,
            troubled_package!("flash-kernel", encountered),
        ),
        Rule::caption(
            "exagear",
            Trigger::Pattern(r"Depends: exagear.* but it is not installable"),
            Category::Package,
            troubled_package!("exagear"),
        ),
        Rule::caption(
            "ca-certificates-java",
            Trigger::Any(&["ca-certificates-java: Depends: ca-certificates-java (>= 20190405~) but it is not going to be installed"]),
            Category::Package,
            troubled_package!("ca-certificates-java"),
        ),
        Rule::caption(
            "steam-launcher",
            Trigger::Pattern(r"dpkg: error processing archive .*steam-launcher"),
            Category::Package,
            troubled_package!("steam-launcher"),
        ),
        Rule::caption(
            "gnome-control-center-data",
            Trigger::Pattern(r"dpkg: error processing archive .*gnome-control-center-data"),
            Category::Package,
            troubled_package!("gnome-control-center-data"),
        ),
        Rule::caption(
            "php7.3-fpm",
            Trigger::Any(&["installed php7.3-fpm package post-installation script subprocess returned error exit status 1"]),
            Category::Package,
            troubled_package!("php7.3-fpm"),
        ),
        Rule::caption(
            "nulog",
            Trigger::Any(&["installed nulog package post-installation script subprocess returned error exit status 1"]),
            Category::Package,
            troubled_package!("nulog"),
        ),
        Rule::caption(
            "wps-office",
            Trigger::Any(&["installed wps-office package post-installation script subprocess returned error exit status 127"]),
            Category::Package,
            troubled_package!("wps-office"),
        ),
        Rule::caption(
            "cmake",
            Trigger::Any(&["cmake but it is not installable"]),
            Category::Package,
            troubled_package!("cmake"),
        ),
        Rule::caption(
            "blockpi-picamera",
            Trigger::Any(&["blockpi : Depends: python3-picamera but it is not installable"]),
            Category::Package,
            "BlockPi could not be installed because the python3-picamera package is missing. \n\n\
             Maybe reinstalling this package would help?",
        ),
        Rule::caption(
            "libgstreamer-dev",
            Trigger::Any(&["libgstreamer1.0-dev: Depends: libgstreamer1.0-dev-bin but it is not installable"]),
            Category::Package,
            troubled_package!("libgstreamer1.0-dev"),
        ),
        Rule::caption(
            "mono-corlib",
            Trigger::Any(&["trying to overwrite '/usr/lib/mono/4.5/mscorlib.dll', which is also in package libmono-corlib4.5-dll"]),
            Category::Package,
            troubled_package!("libmono-corlib4.5-dll"),
        ),
        Rule::caption(
            "androresolvd",
            Trigger::Pattern(
                r"installed android-androresolvd package post-installation script subprocess returned error exit status 1|dpkg: error processing archive .*android-androresolvd",
            ),
            Category::Package,
            troubled_package!("android-androresolvd"),
        ),
        Rule::caption(
            "dahdi-dkms",
            Trigger::Any(&["installed dahdi-dkms package post-installation script subprocess returned error exit status"]),
            Category::Package,
            troubled_package!("dahdi-dkms"),
        ),
        Rule::caption(
            "ffmpeg-libsdl2",
            Trigger::Any(&["ffmpeg : Depends: libsdl2-2.0-0 (>= 2.0.12) but 2.0.10+5rpi is installed"]),
            Category::Package,
            troubled_package!("ffmpeg"),
        ),
        Rule::caption(
            "freedm",
            Trigger::Any(&["freedm : Depends: prboom-plus but it is not going to be installed"]),
            Category::Package,
            "The freedm package on your system is causing problems. \n\n\
             Maybe reinstalling this package and the prboom-plus package would help?",
        ),
        Rule::caption(
            "wsjtx-icon",
            Trigger::Any(&["trying to overwrite '/usr/share/pixmaps/wsjtx_icon.png', which is also in package wsjtx 2.6.1"]),
            Category::Package,
            "The wsjtx-data package is conflicting with the wsjtx package installed on your system. You must fix this to install additional software.\n\n\
             According to the forums at wsjtx.groups.io, you can fix this by uninstalling wsjtx-data with this command:\n\
             sudo apt purge wsjtx-data\n\n\
             Here is the full forum link in case it helps you: https://wsjtx.groups.io/g/main/topic/77286764",
        ),
        Rule::caption(
            "systemd",
            Trigger::Any(&["installed systemd package post-installation script subprocess returned error exit status"]),
            Category::Package,
            "What did you do to your system? The \"systemd\" package is not installing correctly. \n\n\
             Unless you know a lot about Linux, you may just want to reinstall your operating system. :(",
        ),
        Rule::caption(
            "doom3-sdl2",
            Trigger::Pattern(r"trying to overwrite .*, which is also in package sdl2-image"),
            Category::Package,
            "You have some problematic SDL2 packages installed from the Doom 3 app. These custom packages are causing problems with other applications.\n\n\
             Please try to remove these packages manually using:\n\
             sudo apt -y purge sdl2-image\n\
             sudo apt -y purge sdl2-mixer\n\
             sudo apt -y purge sdl2-ttf",
        ),
        Rule::caption(
            "libpagemaker",
            Trigger::Any(&["files list file for package 'libpagemaker-0.0-0:arm64' contains empty filename"]),
            Category::Package,
            "The libpagemaker-0.0-0 package is causing fatal APT issues on your system. You must fix this to install additional software.\n\n\
             Try this: sudo apt purge libpagemaker-0.0-\n\n\
             Search the Internet for more help if this doesn't work.",
        ),
        Rule::caption(
            "ttf-mscorefonts-installer",
            Trigger::Any(&["Package ttf-mscorefonts-installer is not available, but is referred to by another package."]),
            Category::Package,
            "The ttf-mscorefonts-installer package is not available, causing this app to fail to install. You must fix this to install additional software.\n\n\
             ttf-mscorefonts-installer is a package available in the debian contrib section of the repository. \
             If you disabled this, you need to enable installing packages from the contrib section.\n\n\
             If you need more help, search the internet for 'Linux enable contrib repository'",
        ),
        Rule::caption(
            "generic-arm64-kernel",
            Trigger::When(|s| {
                s.host.is_raspberry_pi_os()
                    && pattern(r"linux-image-.*-arm64").map(|re| re.is_match(s.log)).unwrap_or(false)
            }),
            Category::Package,
            "You have a generic ARM64 linux kernel image installed on your system but are running Raspberry Pi OS. \
             This is a package designed for ARM64 servers. You must fix this to prevent apt install/upgrades from erroring.\n\n\
             Try this: sudo apt purge --autoremove linux-image-*-arm64",
        ),
    ]);
    rules
}

fn trixie_release(s: &Scope) -> bool {
    let distro = s.host.distro_id();
    (distro == "Debian" || distro == "Raspbian") && s.host.os.version_id == "13"
}

/// Notice shown on Debian 13 hosts while app support catches up
pub fn release_notice() -> Rule {
    Rule::caption(
        "trixie-release-notice",
        Trigger::When(trixie_release),
        Category::OsReleaseNotice,
        "Not all Pi-Apps apps are supported in Trixie yet.\n\n\
         We are tracking all apps that fail to install on PiOS Trixie from upstream issue https://github.com/Botspot/pi-apps/issues/2829\n\
         Each comment contains a link to the offending actions run showing the install failure. \
         Please check your app that you tried to install that failed to see if it is already reported.\n\n\
         Now would be a great time for Beta Testers to get involved with debugging and triaging these issues.\n\
         In a lot of cases these are issues with the upstream projects (not pi-apps).\n\
         Please open a bug report at the upstream project for the failure and link back to the pi-apps issue if this is the case.\n\n\
         We will make an announcement via our Sharkey server/Github issue when most of these compatibility issues have been resolved.\n\
         Most users should please continue to use PiOS Bookworm for the best Pi-Apps compatibility for the time being.",
    )
}

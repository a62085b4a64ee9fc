//! Repository file integrity on Raspberry Pi OS.
//!
//! These rules look at the host, not the log: a Raspberry Pi OS image that
//! lost its archive.raspberrypi.com entry or its Debian sources file fails
//! installs in ways the log alone does not explain. Releases before 13 use
//! one-line `.list` files, 13 and newer use deb822 `.sources` files.

use crate::diagnosis::Category;
use crate::host::HostInfo;
use crate::rules::{pattern, Rule, Scope, Trigger};

const RASPI_LIST: &str = "/etc/apt/sources.list.d/raspi.list";
const RASPI_SOURCES: &str = "/etc/apt/sources.list.d/raspi.sources";
const SOURCES_LIST: &str = "/etc/apt/sources.list";
const DEBIAN_SOURCES: &str = "/etc/apt/sources.list.d/debian.sources";

const RASPI_DEB_LINE: &str = r"(?m)^deb https?://archive\.raspberrypi\.(org|com)/debian";
const RASPI_URIS_FIELD: &str = r"(?m)^URIs:.*https?://archive\.raspberrypi\.(org|com)/debian";

fn file_matches(host: &HostInfo, path: &str, source: &'static str) -> bool {
    match (host.read(path), pattern(source)) {
        (Some(content), Some(re)) => re.is_match(&content),
        _ => false,
    }
}

pub fn raspi_list_broken(host: &HostInfo) -> bool {
    host.is_raspberry_pi_os()
        && !host.is_deb822_era()
        && !file_matches(host, RASPI_LIST, RASPI_DEB_LINE)
}

pub fn raspi_sources_broken(host: &HostInfo) -> bool {
    host.is_raspberry_pi_os()
        && host.is_deb822_era()
        && !file_matches(host, RASPI_SOURCES, RASPI_URIS_FIELD)
}

pub fn sources_list_missing(host: &HostInfo) -> bool {
    host.is_raspberry_pi_os() && !host.is_deb822_era() && !host.exists(SOURCES_LIST)
}

pub fn debian_sources_missing(host: &HostInfo) -> bool {
    host.is_raspberry_pi_os() && host.is_deb822_era() && !host.exists(DEBIAN_SOURCES)
}

fn altered_intro(file: &str) -> String {
    format!(
        "Packages failed to install because you seem to have deleted or altered an important repository file in /etc/apt/sources.list.d\n\n\
         This error-dialog appeared because /etc/apt/sources.list.d/{file} is missing or altered, but you may have deleted other files as well.\n\
         The {file} file should contain this:\n\n"
    )
}

fn raspi_list_caption(s: &Scope) -> String {
    let codename = s.host.codename();
    format!(
        "{}deb http://archive.raspberrypi.com/debian/ {codename} main\n\
         # Uncomment line below then 'apt-get update' to enable 'apt-get source'\n\
         #deb-src http://archive.raspberrypi.com/debian/ {codename} main",
        altered_intro("raspi.list")
    )
}

fn raspi_sources_caption(s: &Scope) -> String {
    format!(
        "{}Types: deb\n\
         URIs: http://archive.raspberrypi.com/debian/\n\
         Suites: {}\n\
         Components: main\n\
         Signed-By: /usr/share/keyrings/raspberrypi-archive-keyring.pgp\n",
        altered_intro("raspi.sources"),
        s.host.codename()
    )
}

fn deleted_intro(path: &str) -> String {
    format!("Packages failed to install because you deleted an important repository file: {path}\n\n")
}

fn sources_list_caption(s: &Scope) -> String {
    let c = s.host.codename();
    let body = match s.host.long_bit {
        Some(32) => format!(
            "You appear to be using Raspberry Pi OS 32-bit, so the sources.list file should contain this:\n\
             deb http://raspbian.raspberrypi.org/raspbian/ {c} main contrib non-free rpi\n\
             # Uncomment line below then 'apt-get update' to enable 'apt-get source'\n\
             deb-src http://raspbian.raspberrypi.org/raspbian/ {c} main contrib non-free rpi"
        ),
        Some(64) => format!(
            "You appear to be using Raspberry Pi OS 64-bit, so the sources.list file should contain this:\n\
             deb http://deb.debian.org/debian {c} main contrib non-free\n\
             deb http://security.debian.org/debian-security {c}-security main contrib non-free\n\
             deb http://deb.debian.org/debian {c}-updates main contrib non-free\n\
             # Uncomment deb-src lines below then 'apt-get update' to enable 'apt-get source'\n\
             #deb-src http://deb.debian.org/debian {c} main contrib non-free\n\
             #deb-src http://security.debian.org/debian-security {c}-security main contrib non-free\n\
             #deb-src http://deb.debian.org/debian {c}-updates main contrib non-free"
        ),
        _ => restore_hint(SOURCES_LIST),
    };
    format!("{}{}", deleted_intro(SOURCES_LIST), body)
}

fn debian_sources_caption(s: &Scope) -> String {
    let c = s.host.codename();
    let body = match s.host.long_bit {
        Some(bits @ (32 | 64)) => format!(
            "You appear to be using Raspberry Pi OS {bits}-bit, so the debian.sources file should contain this:\n\
             Types: deb\n\
             URIs: http://deb.debian.org/debian/\n\
             Suites: {c} {c}-updates\n\
             Components: main contrib non-free non-free-firmware\n\
             Signed-By: /usr/share/keyrings/debian-archive-keyring.pgp\n\n\
             Types: deb\n\
             URIs: http://deb.debian.org/debian-security/\n\
             Suites: {c}-security\n\
             Components: main contrib non-free non-free-firmware\n\
             Signed-By: /usr/share/keyrings/debian-archive-keyring.pgp"
        ),
        _ => restore_hint(DEBIAN_SOURCES),
    };
    format!("{}{}", deleted_intro(DEBIAN_SOURCES), body)
}

fn restore_hint(path: &str) -> String {
    format!(
        "Refer to your Linux distro's documentation for how to restore this file.\n\
         You may have a backup of it in {path}.save if you have not deleted that as well."
    )
}

/// Host-state rules, in the order they are reported
pub fn rules() -> Vec<Rule> {
    vec![
        Rule::render("raspi-list-altered", Trigger::Host(raspi_list_broken), Category::System, raspi_list_caption),
        Rule::render("raspi-sources-altered", Trigger::Host(raspi_sources_broken), Category::System, raspi_sources_caption),
        Rule::render("sources-list-missing", Trigger::Host(sources_list_missing), Category::System, sources_list_caption),
        Rule::render("debian-sources-missing", Trigger::Host(debian_sources_missing), Category::System, debian_sources_caption),
    ]
}

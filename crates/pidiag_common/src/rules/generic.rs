//! Rules for hosts without a known package manager.
//!
//! The kernel-module and vulkan-hook rules are also part of the apt table.

use super::{Rule, Trigger};
use crate::diagnosis::Category;

/// Anbox and xone DKMS modules that no longer build on current kernels
pub fn kernel_module_rules() -> Vec<Rule> {
    vec![
        Rule::caption(
            "anbox-dkms",
            Trigger::Any(&["Consult /var/lib/dkms/anbox-ashmem/1/build/make.log for more information."]),
            Category::Package,
            "Anbox kernel modules no longer compile on the latest kernel. You need to remove it for the kernel to fully install and for APT to work.\n\
             Run this command to remove anbox kernel modules, then retry the operation.\n\n\
             sudo rm -rf /etc/modules-load.d/anbox.conf /lib/udev/rules.d/99-anbox.rules /usr/src/anbox-ashmem-1/ /usr/src/anbox-binder-1/ /var/lib/dkms/anbox-*",
        ),
        Rule::caption(
            "xone-dkms",
            Trigger::Pattern(r"M=/var/lib/dkms/xone.*bad exit status"),
            Category::Package,
            "The Xone kernel module no longer compile on the latest kernel. You need to remove it for the kernel to fully install and for APT to work.\n\
             Run this command to remove the xone kernel module, then retry the operation:\n\n\
             sudo rm -rf /etc/modules-load.d/xone.conf /etc/udev/rules.d/50-xone.rules /usr/src/xone-*/ /var/lib/dkms/xone-*",
        ),
    ]
}

/// Broken PiKiss post-invoke hook
pub fn vulkan_hook_rule() -> Rule {
    Rule::caption(
        "pikiss-vulkan-hook",
        Trigger::Pattern(
            r"E: Problem executing scripts DPkg::Post-Invoke '/home/.*/mesa_vulkan/reinstall-vulkan-driver\.sh'|Reinstalling Vulkan driver",
        ),
        Category::Package,
        "PiKiss has installed a broken custom vulkan reinstallation apt hook. As a result, dpkg and APT won't work properly.",
    )
}

pub fn rules() -> Vec<Rule> {
    let mut rules = kernel_module_rules();
    rules.push(vulkan_hook_rule());
    rules
}

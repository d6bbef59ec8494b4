use askama::Template;

/// Renders `ipmi_sim`'s lan-config file. Field names mirror the original's
/// string-formatted config, not the upstream simulator's own grammar —
/// this engine never talks to a real BMC, just a simulator that accepts
/// this exact shape.
#[derive(Template)]
#[template(path = "vbmc_conf.txt")]
pub struct VbmcConfig<'a> {
    pub node_name: &'a str,
    pub bmc_address_hex: String,
    pub channel: u32,
    pub lan_channel_name: &'a str,
    pub lan_interface: &'a str,
    pub lan_control_script: &'a str,
    pub start_cmd: &'a str,
    pub startnow: &'a str,
    pub poweroff_wait: i64,
    pub kill_wait: i64,
    pub chassis_control_cmd: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub port_ipmi_console: u16,
    pub port_qemu_ipmi: u16,
    pub port_iol: u16,
    pub historyfru: i64,
    pub sol_device: &'a str,
}

#[derive(Template)]
#[template(path = "startcmd.txt")]
pub struct StartCmdScript<'a> {
    pub vmm_command: &'a str,
    pub pid_file: &'a str,
}

#[derive(Template)]
#[template(path = "stopcmd.txt")]
pub struct StopCmdScript<'a> {
    pub pid_file: &'a str,
}

#[derive(Template)]
#[template(path = "resetcmd.txt")]
pub struct ResetCmdScript<'a> {
    pub stop_script: &'a str,
    pub start_script: &'a str,
}

#[derive(Template)]
#[template(path = "chassiscontrol.txt")]
pub struct ChassisControlScript<'a> {
    pub stop_script: &'a str,
    pub start_script: &'a str,
    pub reset_script: &'a str,
}

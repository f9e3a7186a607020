use std::process::Command;

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

#[cfg(not(target_os = "windows"))]
fn get_child_pids(pid: u32) -> Vec<u32> {
    let output = Command::new("pgrep")
        .args(["-P", &pid.to_string()])
        .output();

    match output {
        Ok(output) => String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// 强制杀死进程树，包括 uvicorn 派生的 worker 子进程
pub fn kill_process_tree(pid: u32) -> Result<(), String> {
    #[cfg(target_os = "windows")]
    {
        let mut kill_command = Command::new("taskkill");
        kill_command.args(["/PID", &pid.to_string(), "/T", "/F"]);

        const CREATE_NO_WINDOW: u32 = 0x08000000;
        kill_command.creation_flags(CREATE_NO_WINDOW);

        kill_command
            .output()
            .map_err(|e| format!("failed to run taskkill for pid {}: {}", pid, e))?;

        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    {
        // 先收集整棵子树再逐个强杀，避免子进程被 init 收养后丢失
        let mut pids = Vec::new();
        collect_tree(pid, &mut pids);

        for target in pids.into_iter().rev() {
            let _ = Command::new("kill")
                .args(["-9", &target.to_string()])
                .output();
        }

        Ok(())
    }
}

/// 深度优先收集，父进程在前
#[cfg(not(target_os = "windows"))]
fn collect_tree(pid: u32, pids: &mut Vec<u32>) {
    pids.push(pid);
    for child_pid in get_child_pids(pid) {
        collect_tree(child_pid, pids);
    }
}

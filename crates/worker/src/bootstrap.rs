//! 引导脚本生成
//!
//! 基础模板 + 可选的SSH公钥注入段 + 按模板类型追加的工作负载段，
//! 各段之间空一行，结尾恰好一个换行符。纯文本拼接，相同输入输出完全一致。

use provisioner_core::ProvisionTemplate;

const VPS_BASE_TEMPLATE: &str = include_str!("../templates/vps-base.sh");
const RPC_PLACEHOLDER_TEMPLATE: &str = include_str!("../templates/rpc-placeholder.sh");

const SERVICE_USER: &str = "web3ho";

/// 生成实例引导脚本
pub fn build_bootstrap_script(template: ProvisionTemplate, ssh_public_key: Option<&str>) -> String {
    let mut parts: Vec<String> = vec![VPS_BASE_TEMPLATE.trim_end().to_string()];

    if let Some(key) = ssh_public_key.map(str::trim).filter(|k| !k.is_empty()) {
        parts.extend(ssh_key_block(key));
    }

    if template == ProvisionTemplate::RpcPlaceholder {
        parts.push(RPC_PLACEHOLDER_TEMPLATE.trim_end().to_string());
    }

    format!("{}\n", parts.join("\n\n"))
}

fn ssh_key_block(key: &str) -> Vec<String> {
    let ssh_dir = format!("/home/{SERVICE_USER}/.ssh");
    vec![
        format!("mkdir -p {ssh_dir}"),
        format!("echo {} > {ssh_dir}/authorized_keys", shell_single_quote(key)),
        format!("chown -R {SERVICE_USER}:{SERVICE_USER} {ssh_dir}"),
        format!("chmod 700 {ssh_dir}"),
        format!("chmod 600 {ssh_dir}/authorized_keys"),
    ]
}

/// 单引号包裹，内部的 `'` 转成 `'\''`
fn shell_single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIBv8 user@laptop";

    #[test]
    fn test_same_inputs_produce_identical_output() {
        let a = build_bootstrap_script(ProvisionTemplate::RpcPlaceholder, Some(KEY));
        let b = build_bootstrap_script(ProvisionTemplate::RpcPlaceholder, Some(KEY));
        assert_eq!(a, b);
    }

    #[test]
    fn test_base_only_without_key() {
        let script = build_bootstrap_script(ProvisionTemplate::VpsBase, None);
        assert!(script.starts_with("#!/usr/bin/env bash"));
        assert!(!script.contains("authorized_keys"));
        assert!(!script.contains("RPC node placeholder"));
    }

    #[test]
    fn test_blank_key_is_ignored() {
        let script = build_bootstrap_script(ProvisionTemplate::VpsBase, Some("  "));
        assert!(!script.contains("authorized_keys"));
    }

    #[test]
    fn test_key_block_written_once_with_permissions() {
        let script = build_bootstrap_script(ProvisionTemplate::VpsBase, Some(KEY));

        let writes = script
            .lines()
            .filter(|line| line.contains("> /home/web3ho/.ssh/authorized_keys"))
            .count();
        assert_eq!(writes, 1);
        assert!(script.contains(&format!("echo '{KEY}' > /home/web3ho/.ssh/authorized_keys")));
        assert!(script.contains("chown -R web3ho:web3ho /home/web3ho/.ssh"));
        assert!(script.contains("chmod 700 /home/web3ho/.ssh"));
        assert!(script.contains("chmod 600 /home/web3ho/.ssh/authorized_keys"));
    }

    #[test]
    fn test_single_quotes_in_key_are_escaped() {
        let script = build_bootstrap_script(ProvisionTemplate::VpsBase, Some("ssh-rsa AAAA it's-me"));
        assert!(script.contains(r"echo 'ssh-rsa AAAA it'\''s-me' > /home/web3ho/.ssh/authorized_keys"));
    }

    #[test]
    fn test_quoted_key_line_is_balanced() {
        let script = build_bootstrap_script(ProvisionTemplate::VpsBase, Some("a'b'c"));
        let line = script
            .lines()
            .find(|line| line.starts_with("echo "))
            .unwrap();
        // `'\''` 模式下，去掉转义后的引号数量必须成对
        let unescaped = line.replace(r"\'", "");
        assert_eq!(unescaped.matches('\'').count() % 2, 0);
    }

    #[test]
    fn test_rpc_template_appended_after_key_block() {
        let script = build_bootstrap_script(ProvisionTemplate::RpcPlaceholder, Some(KEY));
        let key_pos = script.find("authorized_keys").unwrap();
        let rpc_pos = script.find("RPC node placeholder").unwrap();
        assert!(rpc_pos > key_pos);
    }

    #[test]
    fn test_ends_with_exactly_one_newline() {
        for template in [ProvisionTemplate::VpsBase, ProvisionTemplate::RpcPlaceholder] {
            for key in [None, Some(KEY)] {
                let script = build_bootstrap_script(template, key);
                assert!(script.ends_with('\n'));
                assert!(!script.ends_with("\n\n"));
            }
        }
    }

    #[test]
    fn test_parts_are_separated_by_blank_lines() {
        let script = build_bootstrap_script(ProvisionTemplate::VpsBase, Some(KEY));
        assert!(script.contains("mkdir -p /home/web3ho/.ssh\n\necho '"));
    }
}

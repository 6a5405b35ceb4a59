use super::{fill, render_globals, HookParams, ShellFormatter, EVAL_COMMANDS, SCRIPT_MARK};
use crate::types::ShellKind;

/// cmd.exe has no functions or eval, so scripts target Clink's Lua runtime.
#[derive(Debug, Clone, Copy)]
pub struct ClinkFormatter;

impl ShellFormatter for ClinkFormatter {
    fn kind(&self) -> ShellKind {
        ShellKind::Cmd
    }

    fn quote(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('"');
        for c in value.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }

    fn render_set_env(&self, name: &str, value: &str) -> String {
        format!("os.setenv(\"{name}\",{})", self.quote(value))
    }

    fn render_unset_env(&self, name: &str) -> String {
        format!("os.unsetenv(\"{name}\")")
    }

    fn render_add_path(&self, paths: &[String]) -> String {
        let sep = self.path_separator();
        let prefix = format!("{}{sep}", paths.join(sep));
        format!(
            "os.setenv(\"PATH\",{} .. (os.getenv(\"PATH\") or \"\"))",
            self.quote(&prefix)
        )
    }

    fn render_set_path(&self, paths: &[String]) -> String {
        format!("os.setenv(\"PATH\",{})", self.quote(&paths.join(self.path_separator())))
    }

    fn path_separator(&self) -> &'static str {
        ";"
    }

    fn hook_script(&self, params: &HookParams) -> String {
        let aliases = params
            .aliases
            .iter()
            .map(|(name, value)| {
                format!("os.setalias({}, {})", self.quote(name), self.quote(value))
            })
            .collect::<Vec<_>>()
            .join("\n");
        let eval_commands = EVAL_COMMANDS
            .iter()
            .map(|c| format!("[{}] = true", self.quote(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let vars = [
            ("PROGRAM", self.quote(&params.program)),
            ("SESSION_ID", self.quote(&params.session_id)),
            ("MARK", self.quote(SCRIPT_MARK)),
            ("EVAL_COMMANDS", eval_commands),
            ("GLOBALS", render_globals(self, params)),
            ("ALIASES", aliases),
            ("HOOKS_DIR", self.quote(&params.hooks_dir)),
        ];
        fill(CLINK_HOOK, &vars)
    }
}

const CLINK_HOOK: &str = r#"-- xenv hook for cmd (Clink)
-- save as %LOCALAPPDATA%\clink\xenv.lua: xenv shell --type cmd > "%LOCALAPPDATA%\clink\xenv.lua"

os.setenv("XENV_HOOK_SHELL","cmd")
os.setenv("XENV_SESSION_ID",{{SESSION_ID}})

local xenv_program = {{PROGRAM}}
local xenv_mark = {{MARK}}
local xenv_eval_commands = { {{EVAL_COMMANDS}} }

local function xenv_eval(output)
    local idx = output:find(xenv_mark, 1, true)
    if not idx then
        if output:match("%S") then print((output:gsub("%s+$", ""))) end
        return
    end
    local message = output:sub(1, idx - 1):gsub("%s+$", "")
    local expression = output:sub(idx + #xenv_mark)
    if message ~= "" then print(message) end
    local chunk, err = load(expression)
    if chunk then
        chunk()
    else
        print("xenv: " .. tostring(err))
    end
end

local function xenv_run(args)
    local handle = io.popen(xenv_program .. " " .. args)
    if not handle then return end
    local output = handle:read("*a") or ""
    handle:close()
    xenv_eval(output)
end

local function xenv_filter(line)
    local sub, rest = line:match("^%s*xenv%s+(%S+)(.*)$")
    if not sub then return end
    if xenv_eval_commands[sub] then
        xenv_run(sub .. rest)
        return ""
    end
    if sub == "set" or sub == "unset" then
        xenv_run("env " .. sub .. rest)
        return ""
    end
end

if clink.onfilterinput then
    clink.onfilterinput(xenv_filter)
end

{{GLOBALS}}
{{ALIASES}}

local xenv_last_cwd = nil
clink.onbeginedit(function()
    local cwd = os.getcwd()
    if cwd ~= xenv_last_cwd then
        xenv_last_cwd = cwd
        xenv_run("direnv")
    end
end)

local xenv_hooks_dir = {{HOOKS_DIR}}
if os.isdir(xenv_hooks_dir) then
    for _, name in ipairs(os.globfiles(path.join(xenv_hooks_dir, "*.lua"))) do
        dofile(path.join(xenv_hooks_dir, name))
    end
end
"#;

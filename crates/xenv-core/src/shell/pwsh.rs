use super::{
    fill, render_globals, HookParams, ShellFormatter, COMPLETION_WORDS, EVAL_COMMANDS, SCRIPT_MARK,
};
use crate::types::ShellKind;

#[derive(Debug, Clone, Copy)]
pub struct PwshFormatter;

impl ShellFormatter for PwshFormatter {
    fn kind(&self) -> ShellKind {
        ShellKind::Pwsh
    }

    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn render_set_env(&self, name: &str, value: &str) -> String {
        format!("$Env:{name}={}", self.quote(value))
    }

    fn render_unset_env(&self, name: &str) -> String {
        format!("Remove-Item Env:{name} -ErrorAction SilentlyContinue")
    }

    fn render_add_path(&self, paths: &[String]) -> String {
        let sep = self.path_separator();
        let joined = paths.join(sep);
        format!("$Env:PATH={} + $Env:PATH", self.quote(&format!("{joined}{sep}")))
    }

    fn render_set_path(&self, paths: &[String]) -> String {
        format!("$Env:PATH={}", self.quote(&paths.join(self.path_separator())))
    }

    fn path_separator(&self) -> &'static str {
        if cfg!(windows) {
            ";"
        } else {
            ":"
        }
    }

    fn hook_script(&self, params: &HookParams) -> String {
        let aliases = params
            .aliases
            .iter()
            .map(|(name, value)| format!("function global:{name} {{ {value} @args }}"))
            .collect::<Vec<_>>()
            .join("\n");
        let list = |words: &[&str]| {
            words
                .iter()
                .map(|w| self.quote(w))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let vars = [
            ("PROGRAM", self.quote(&params.program)),
            ("SESSION_ID", self.quote(&params.session_id)),
            ("MARK", self.quote(SCRIPT_MARK)),
            ("EVAL_COMMANDS", list(EVAL_COMMANDS)),
            ("WORDS", list(COMPLETION_WORDS)),
            ("GLOBALS", render_globals(self, params)),
            ("ALIASES", aliases),
            ("HOOKS_DIR", self.quote(&params.hooks_dir)),
        ];
        fill(PWSH_HOOK, &vars)
    }
}

const PWSH_HOOK: &str = r#"# xenv hook for PowerShell
# add to $PROFILE: Invoke-Expression (& xenv shell --type pwsh | Out-String)

$Env:XENV_HOOK_SHELL='pwsh'
$Env:XENV_SESSION_ID={{SESSION_ID}}

function Get-XenvExecutable {
    (Get-Command {{PROGRAM}} -CommandType Application | Select-Object -First 1).Source
}

function Invoke-XenvResult([string]$Result) {
    $marker = {{MARK}}
    $index = $Result.IndexOf($marker)
    if ($index -lt 0) {
        if ($Result.Trim()) { Write-Host $Result.TrimEnd() }
        return
    }
    $message = $Result.Substring(0, $index).TrimEnd()
    $expression = $Result.Substring($index + $marker.Length)
    if ($message) { Write-Host $message }
    if ($expression.Trim()) { Invoke-Expression $expression }
}

function Invoke-XenvCommand {
    $exe = Get-XenvExecutable
    $output = & $exe @args | Out-String
    Invoke-XenvResult $output
}

function xenv {
    $evalCommands = @({{EVAL_COMMANDS}})
    if ($args.Count -gt 0 -and $evalCommands -contains $args[0]) {
        Invoke-XenvCommand @args
    } elseif ($args.Count -gt 0 -and @('set', 'unset') -contains $args[0]) {
        Invoke-XenvCommand env @args
    } else {
        $exe = Get-XenvExecutable
        & $exe @args
    }
}

{{GLOBALS}}
{{ALIASES}}

Register-ArgumentCompleter -Native -CommandName xenv -ScriptBlock {
    param($wordToComplete, $commandAst, $cursorPosition)
    @({{WORDS}}) | Where-Object { $_ -like "$wordToComplete*" } | ForEach-Object {
        [System.Management.Automation.CompletionResult]::new($_, $_, 'ParameterValue', $_)
    }
}

$global:XenvLastLocation = $null
$global:XenvOriginalPrompt = $function:prompt
function global:prompt {
    $current = (Get-Location).Path
    if ($current -ne $global:XenvLastLocation) {
        $global:XenvLastLocation = $current
        Invoke-XenvCommand direnv
    }
    & $global:XenvOriginalPrompt
}

$xenvHooksDir = {{HOOKS_DIR}}
if (Test-Path $xenvHooksDir) {
    Get-ChildItem -Path $xenvHooksDir -Filter *.ps1 | ForEach-Object { . $_.FullName }
}
Remove-Variable xenvHooksDir
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_doubles_single_quotes() {
        assert_eq!(PwshFormatter.quote("it's"), "'it''s'");
    }

    #[test]
    fn set_env_idiom() {
        assert_eq!(
            PwshFormatter.render_set_env("JAVA_HOME", "/opt/jdk"),
            "$Env:JAVA_HOME='/opt/jdk'"
        );
    }

    #[test]
    fn add_path_prepends_with_separator() {
        let sep = PwshFormatter.path_separator();
        let script = PwshFormatter.render_add_path(&["/a".to_string()]);
        assert_eq!(script, format!("$Env:PATH='/a{sep}' + $Env:PATH"));
    }

    #[test]
    fn hook_wraps_prompt_and_registers_completion() {
        let params = HookParams {
            program: "xenv".into(),
            session_id: "s1".into(),
            hooks_dir: "C:\\Users\\dev\\xenv\\hooks".into(),
            ..Default::default()
        };
        let script = PwshFormatter.hook_script(&params);
        assert!(script.contains("$Env:XENV_HOOK_SHELL='pwsh'"));
        assert!(script.contains("function global:prompt"));
        assert!(script.contains("Register-ArgumentCompleter"));
        assert!(script.contains("'use', 'unuse', 'env', 'path', 'direnv'"));
        assert!(script.contains("$xenvHooksDir = 'C:\\Users\\dev\\xenv\\hooks'"));
    }
}

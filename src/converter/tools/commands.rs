//! Command builders for the Android and JDK tools.
//!
//! Each builder returns an [`Invocation`] describing the exact command line
//! plus the inputs it reads and the outputs it must produce.

use super::Invocation;
use crate::converter::{
    error::Result,
    mode::ApksMode,
    settings::{ApksOptions, Tool, ToolPaths},
    signing::SigningMaterial,
};
use std::path::Path;

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// `aapt2 convert -o <output> --output-format proto <apk>`
pub fn aapt2_convert_proto(tools: &ToolPaths, apk: &Path, output: &Path) -> Result<Invocation> {
    Ok(Invocation {
        tool: Tool::Aapt2,
        label: "aapt2 convert".into(),
        program: tools.require(Tool::Aapt2)?.to_path_buf(),
        args: vec![
            "convert".into(),
            "-o".into(),
            path_arg(output),
            "--output-format".into(),
            "proto".into(),
            path_arg(apk),
        ],
        inputs: vec![apk.to_path_buf()],
        outputs: vec![output.to_path_buf()],
        secrets: vec![],
    })
}

/// `aapt2 dump badging <apk>`
pub fn aapt2_dump_badging(tools: &ToolPaths, apk: &Path) -> Result<Invocation> {
    Ok(Invocation {
        tool: Tool::Aapt2,
        label: "aapt2 dump badging".into(),
        program: tools.require(Tool::Aapt2)?.to_path_buf(),
        args: vec!["dump".into(), "badging".into(), path_arg(apk)],
        inputs: vec![apk.to_path_buf()],
        outputs: vec![],
        secrets: vec![],
    })
}

fn bundletool(tools: &ToolPaths, command: &str) -> Result<(std::path::PathBuf, Vec<String>)> {
    let java = tools.require(Tool::Java)?.to_path_buf();
    let jar = tools.require(Tool::Bundletool)?;
    Ok((
        java,
        vec!["-jar".into(), path_arg(jar), command.to_string()],
    ))
}

/// `java -jar bundletool.jar build-bundle --modules=<zip> --output=<aab>`
pub fn bundletool_build_bundle(
    tools: &ToolPaths,
    modules_zip: &Path,
    output: &Path,
) -> Result<Invocation> {
    let (program, mut args) = bundletool(tools, "build-bundle")?;
    args.push(format!("--modules={}", modules_zip.display()));
    args.push(format!("--output={}", output.display()));

    Ok(Invocation {
        tool: Tool::Bundletool,
        label: "bundletool build-bundle".into(),
        program,
        args,
        inputs: vec![modules_zip.to_path_buf()],
        outputs: vec![output.to_path_buf()],
        secrets: vec![],
    })
}

/// `java -jar bundletool.jar build-apks --bundle=<aab> --output=<apks> --overwrite ...`
///
/// Without signing material bundletool signs with its debug key.
pub fn bundletool_build_apks(
    tools: &ToolPaths,
    bundle: &Path,
    output: &Path,
    mode: ApksMode,
    options: &ApksOptions,
    signing: Option<&SigningMaterial>,
) -> Result<Invocation> {
    let (program, mut args) = bundletool(tools, "build-apks")?;
    args.push(format!("--bundle={}", bundle.display()));
    args.push(format!("--output={}", output.display()));
    args.push("--overwrite".into());

    if mode != ApksMode::Default {
        args.push(format!("--mode={mode}"));
    }
    let mut inputs = vec![bundle.to_path_buf()];
    if let Some(spec) = &options.device_spec {
        args.push(format!("--device-spec={}", spec.display()));
        inputs.push(spec.clone());
    }
    if options.local_testing {
        args.push("--local-testing".into());
    }
    if options.verbose {
        args.push("--verbose".into());
    }
    if let Some(aapt2) = tools.get(Tool::Aapt2) {
        args.push(format!("--aapt2={}", aapt2.display()));
    }

    let mut secrets = Vec::new();
    if let Some(material) = signing {
        args.push(format!("--ks={}", material.keystore.display()));
        args.push(format!("--ks-pass=pass:{}", material.store_password));
        args.push(format!("--ks-key-alias={}", material.alias));
        args.push(format!("--key-pass=pass:{}", material.key_password));
        secrets.push(material.store_password.clone());
        secrets.push(material.key_password.clone());
    }

    Ok(Invocation {
        tool: Tool::Bundletool,
        label: "bundletool build-apks".into(),
        program,
        args,
        inputs,
        outputs: vec![output.to_path_buf()],
        secrets,
    })
}

/// `keytool -genkeypair` for a new RSA keystore.
pub fn keytool_genkeypair(
    tools: &ToolPaths,
    keystore: &Path,
    alias: &str,
    password: &str,
    dname: &str,
    key_size: u32,
    validity_days: u32,
) -> Result<Invocation> {
    Ok(Invocation {
        tool: Tool::Keytool,
        label: "keytool -genkeypair".into(),
        program: tools.require(Tool::Keytool)?.to_path_buf(),
        args: vec![
            "-genkeypair".into(),
            "-alias".into(),
            alias.into(),
            "-keyalg".into(),
            "RSA".into(),
            "-keysize".into(),
            key_size.to_string(),
            "-validity".into(),
            validity_days.to_string(),
            "-keystore".into(),
            path_arg(keystore),
            "-storepass".into(),
            password.into(),
            "-keypass".into(),
            password.into(),
            "-dname".into(),
            dname.into(),
        ],
        inputs: vec![],
        outputs: vec![keystore.to_path_buf()],
        secrets: vec![password.to_string()],
    })
}

/// `jarsigner` with SHA256withRSA, signing `artifact` in place.
pub fn jarsigner_sign(
    tools: &ToolPaths,
    artifact: &Path,
    material: &SigningMaterial,
) -> Result<Invocation> {
    Ok(Invocation {
        tool: Tool::Jarsigner,
        label: "jarsigner".into(),
        program: tools.require(Tool::Jarsigner)?.to_path_buf(),
        args: vec![
            "-sigalg".into(),
            "SHA256withRSA".into(),
            "-digestalg".into(),
            "SHA-256".into(),
            "-keystore".into(),
            path_arg(&material.keystore),
            "-storepass".into(),
            material.store_password.clone(),
            "-keypass".into(),
            material.key_password.clone(),
            path_arg(artifact),
            material.alias.clone(),
        ],
        inputs: vec![artifact.to_path_buf(), material.keystore.clone()],
        outputs: vec![artifact.to_path_buf()],
        secrets: vec![material.store_password.clone(), material.key_password.clone()],
    })
}

/// `apksigner sign ... --out <output> <input>`
pub fn apksigner_sign(
    tools: &ToolPaths,
    input: &Path,
    output: &Path,
    material: &SigningMaterial,
) -> Result<Invocation> {
    Ok(Invocation {
        tool: Tool::Apksigner,
        label: "apksigner sign".into(),
        program: tools.require(Tool::Apksigner)?.to_path_buf(),
        args: vec![
            "sign".into(),
            "--ks".into(),
            path_arg(&material.keystore),
            "--ks-pass".into(),
            format!("pass:{}", material.store_password),
            "--ks-key-alias".into(),
            material.alias.clone(),
            "--key-pass".into(),
            format!("pass:{}", material.key_password),
            "--out".into(),
            path_arg(output),
            path_arg(input),
        ],
        inputs: vec![input.to_path_buf(), material.keystore.clone()],
        outputs: vec![output.to_path_buf()],
        secrets: vec![material.store_password.clone(), material.key_password.clone()],
    })
}

/// `zipalign -f -p 4 <input> <output>`
pub fn zipalign(tools: &ToolPaths, input: &Path, output: &Path) -> Result<Invocation> {
    Ok(Invocation {
        tool: Tool::Zipalign,
        label: "zipalign".into(),
        program: tools.require(Tool::Zipalign)?.to_path_buf(),
        args: vec![
            "-f".into(),
            "-p".into(),
            "4".into(),
            path_arg(input),
            path_arg(output),
        ],
        inputs: vec![input.to_path_buf()],
        outputs: vec![output.to_path_buf()],
        secrets: vec![],
    })
}

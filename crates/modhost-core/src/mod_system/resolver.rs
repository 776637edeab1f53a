//! Manifest discovery, validation and dependency ordering.
//!
//! All three steps are pure functions of the mods folder contents: nothing
//! here loads code or touches the registry.
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use log::{debug, trace};
use semver::Version;

use crate::kernel::constants::MANIFEST_FILE_NAME;
use crate::mod_system::error::{DependencyError, ManifestError, ModSystemError, ValidationError};
use crate::mod_system::manifest::Manifest;
use crate::mod_system::metadata::ModMetadata;

/// Scan `root` and read one [`ModMetadata`] per mod folder.
///
/// Unreadable or malformed manifests produce entries that are already
/// failed; only an unreadable root aborts the scan.
pub fn read_manifests(root: &Path) -> Result<Vec<ModMetadata>, ModSystemError> {
    trace!("Loading mod metadata from {}...", root.display());
    let (folders, loose_files) = list_children(root).map_err(|source| ModSystemError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    if !loose_files.is_empty() {
        trace!("  Ignored loose files: {}", loose_files.join(", "));
    }

    let mut mods = Vec::new();
    for folder in folders {
        scan_folder(root, &root.join(&folder), &mut mods);
    }
    debug!("Found {} mod folder(s) in {}", mods.len(), root.display());
    Ok(mods)
}

/// Sorted (folders, files) directly inside `dir`, skipping dot-folders.
fn list_children(dir: &Path) -> std::io::Result<(Vec<String>, Vec<String>)> {
    let mut folders = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            if name.starts_with('.') {
                trace!("  Skipped {} (folder name starts with a dot).", entry.path().display());
                continue;
            }
            folders.push(name);
        } else {
            files.push(name);
        }
    }
    folders.sort_by_key(|name| name.to_lowercase());
    files.sort_by_key(|name| name.to_lowercase());
    Ok((folders, files))
}

fn relative_path(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn scan_folder(root: &Path, dir: &Path, mods: &mut Vec<ModMetadata>) {
    let relative = relative_path(root, dir);
    let manifest_path = dir.join(MANIFEST_FILE_NAME);

    if manifest_path.is_file() {
        let metadata = match fs::read_to_string(&manifest_path) {
            Ok(content) => match Manifest::from_json(&content) {
                Ok(manifest) => ModMetadata::new(dir, relative, manifest),
                Err((error, detail)) => ModMetadata::without_manifest(dir, relative, error, detail),
            },
            Err(e) => ModMetadata::without_manifest(dir, relative, ManifestError::Unparsable, Some(e.to_string())),
        };
        mods.push(metadata);
        return;
    }

    match list_children(dir) {
        Ok((folders, _)) if !folders.is_empty() => {
            // A folder of mod folders
            trace!("  Scanning mod group folder {relative}...");
            for folder in folders {
                scan_folder(root, &dir.join(folder), mods);
            }
        }
        Ok((_, files)) if files.is_empty() => {
            mods.push(ModMetadata::without_manifest(dir, relative, ManifestError::EmptyFolder, None));
        }
        Ok(_) => {
            mods.push(ModMetadata::without_manifest(dir, relative, ManifestError::Missing, None));
        }
        Err(e) => {
            mods.push(ModMetadata::without_manifest(
                dir,
                relative,
                ManifestError::UnreadableFolder,
                Some(e.to_string()),
            ));
        }
    }
}

/// Fail mods whose manifests conflict with each other or with the host.
///
/// Every mod sharing a (case-insensitive) unique ID is failed, not just the
/// later copies.
pub fn validate_manifests(mods: &mut [ModMetadata], host_api_version: &Version) {
    let mut by_id: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, metadata) in mods.iter().enumerate() {
        if metadata.is_failed() {
            continue;
        }
        if let Some(id) = metadata.unique_id() {
            by_id.entry(id.to_lowercase()).or_default().push(index);
        }
    }
    for indices in by_id.values().filter(|indices| indices.len() > 1) {
        let folders: Vec<String> = indices
            .iter()
            .map(|&i| mods[i].relative_directory().to_string())
            .collect();
        for &i in indices {
            mods[i].fail(ValidationError::DuplicateId { folders: folders.clone() }, None);
        }
    }

    for metadata in mods.iter_mut().filter(|m| !m.is_failed()) {
        let Some(manifest) = metadata.manifest().cloned() else {
            continue;
        };
        if let Some(required) = &manifest.minimum_api_version {
            if required > host_api_version {
                metadata.fail(
                    ValidationError::ApiTooOld {
                        required: required.to_string(),
                        host: host_api_version.to_string(),
                    },
                    None,
                );
                continue;
            }
        }
        if manifest.dependencies.iter().any(|d| manifest.has_id(&d.unique_id)) {
            metadata.fail(ValidationError::SelfDependency, None);
        }
    }
}

/// Dependency graph over the mods that survived validation.
struct Graph {
    /// Required dependencies of each node (edges point at what it needs)
    requires: Vec<Vec<usize>>,
    /// Reverse of `requires`
    dependents: Vec<Vec<usize>>,
    /// Optional dependencies, used only to break ordering ties
    prefers: Vec<Vec<usize>>,
    /// Owner of each content bundle. It orders like a required edge, but an
    /// owner failure is settled by the loader rather than propagated here.
    owner: Vec<Option<usize>>,
}

/// Order mods so every required dependency precedes its dependents.
///
/// Mods with a missing, failed or circular required dependency are failed,
/// naming the nearest failed dependency; this propagates down arbitrarily
/// long chains in a single topological pass. Content bundles are placed
/// after their owner. Ties are broken by display
/// name (case-insensitive), preferring mods whose optional dependencies are
/// already placed. Mods that failed earlier are returned at the end.
pub fn process_dependencies(mods: Vec<ModMetadata>) -> Vec<ModMetadata> {
    let mut mods = mods;
    let count = mods.len();
    let live: Vec<bool> = mods.iter().map(|m| !m.is_failed()).collect();

    let mut id_index: HashMap<String, usize> = HashMap::new();
    for (index, metadata) in mods.iter().enumerate() {
        if let Some(id) = metadata.unique_id() {
            let key = id.to_lowercase();
            // Prefer a live entry when a failed duplicate shares the ID
            if live[index] || !id_index.contains_key(&key) {
                id_index.insert(key, index);
            }
        }
    }

    let mut graph = Graph {
        requires: vec![Vec::new(); count],
        dependents: vec![Vec::new(); count],
        prefers: vec![Vec::new(); count],
        owner: vec![None; count],
    };
    for index in (0..count).filter(|&i| live[i]) {
        let Some(manifest) = mods[index].manifest().cloned() else {
            continue;
        };
        let mut missing = Vec::new();
        let mut failed_dependency = None;
        let mut too_low = None;
        let mut seen = HashSet::new();
        if let Some(owner_id) = &manifest.content_bundle_for {
            if let Some(owner) = id_index.get(&owner_id.to_lowercase()).copied().filter(|&o| live[o] && o != index) {
                graph.owner[index] = Some(owner);
                seen.insert(owner);
                graph.requires[index].push(owner);
                graph.dependents[owner].push(index);
            }
        }
        for dependency in &manifest.dependencies {
            let target = id_index.get(&dependency.unique_id.to_lowercase()).copied();
            if !dependency.is_required {
                if let Some(target) = target.filter(|&t| live[t]) {
                    graph.prefers[index].push(target);
                }
                continue;
            }
            match target {
                None => missing.push(dependency.unique_id.clone()),
                Some(target) if !live[target] => {
                    failed_dependency.get_or_insert_with(|| mods[target].display_name().to_string());
                }
                Some(target) => {
                    if let (Some(minimum), Some(installed)) = (&dependency.minimum_version, mods[target].manifest()) {
                        if &installed.version < minimum && too_low.is_none() {
                            too_low = Some(DependencyError::VersionTooLow {
                                name: installed.name.clone(),
                                minimum: minimum.to_string(),
                                installed: installed.version.to_string(),
                            });
                        }
                    }
                    if seen.insert(target) {
                        graph.requires[index].push(target);
                        graph.dependents[target].push(index);
                    }
                }
            }
        }

        if !missing.is_empty() {
            mods[index].fail(DependencyError::Missing { ids: missing }, None);
        } else if let Some(name) = failed_dependency {
            mods[index].fail(DependencyError::Failed { name }, None);
        } else if let Some(error) = too_low {
            mods[index].fail(error, None);
        }
    }

    let order = topological_order(&mut mods, &graph, &live);

    let mut slots: Vec<Option<ModMetadata>> = mods.into_iter().map(Some).collect();
    let mut ordered: Vec<ModMetadata> = order.into_iter().filter_map(|i| slots[i].take()).collect();
    let mut earlier_failures: Vec<ModMetadata> = slots.into_iter().flatten().collect();
    earlier_failures.sort_by_key(|m| m.display_name().to_lowercase());
    ordered.extend(earlier_failures);
    ordered
}

fn sort_key(metadata: &ModMetadata, index: usize) -> (String, String, usize) {
    (
        metadata.display_name().to_lowercase(),
        metadata.unique_id().unwrap_or_default().to_lowercase(),
        index,
    )
}

/// Kahn's algorithm over the live nodes, breaking any cycles it gets stuck on.
fn topological_order(mods: &mut [ModMetadata], graph: &Graph, live: &[bool]) -> Vec<usize> {
    let count = mods.len();
    let mut in_degree: Vec<usize> = graph.requires.iter().map(Vec::len).collect();
    let mut placed = vec![false; count];
    let mut order = Vec::with_capacity(count);
    let mut ready: BTreeSet<(String, String, usize)> = (0..count)
        .filter(|&i| live[i] && in_degree[i] == 0)
        .map(|i| sort_key(&mods[i], i))
        .collect();

    loop {
        while let Some(key) = next_ready(&ready, graph, &placed) {
            ready.remove(&key);
            let node = key.2;
            placed[node] = true;
            order.push(node);

            if !mods[node].is_failed() {
                if let Some(&failed) = graph.requires[node]
                    .iter()
                    .find(|&&dep| Some(dep) != graph.owner[node] && mods[dep].is_failed())
                {
                    let name = mods[failed].display_name().to_string();
                    mods[node].fail(DependencyError::Failed { name }, None);
                }
            }
            for &dependent in &graph.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(sort_key(&mods[dependent], dependent));
                }
            }
        }

        let stuck: Vec<usize> = (0..count).filter(|&i| live[i] && !placed[i]).collect();
        if stuck.is_empty() {
            return order;
        }

        // Everything left waits on a cycle. Fail the cycle members and
        // release whatever depended on them.
        let mut in_stuck = vec![false; count];
        for &node in &stuck {
            in_stuck[node] = true;
        }
        let mut members: Vec<usize> = strongly_connected(&stuck, &graph.requires, &in_stuck)
            .into_iter()
            .filter(|component| component.len() > 1)
            .flatten()
            .collect();
        if members.is_empty() {
            // Unreachable for a consistent graph; place the rest as-is rather than loop forever
            members = stuck;
        }
        members.sort_by_key(|&i| sort_key(&mods[i], i));
        let mut in_cycle = vec![false; count];
        for &node in &members {
            in_cycle[node] = true;
        }

        for &node in &members {
            let cycle = cycle_through(node, &graph.requires, &in_cycle)
                .into_iter()
                .map(|i| mods[i].display_name().to_string())
                .collect();
            mods[node].fail(DependencyError::Cycle { cycle }, None);
        }
        for &node in &members {
            placed[node] = true;
            order.push(node);
            for &dependent in &graph.dependents[node] {
                if in_cycle[dependent] {
                    continue;
                }
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(sort_key(&mods[dependent], dependent));
                }
            }
        }
    }
}

/// First ready node whose optional dependencies are already placed, or
/// simply the first ready node.
fn next_ready(
    ready: &BTreeSet<(String, String, usize)>,
    graph: &Graph,
    placed: &[bool],
) -> Option<(String, String, usize)> {
    ready
        .iter()
        .find(|key| graph.prefers[key.2].iter().all(|&dep| placed[dep]))
        .or_else(|| ready.iter().next())
        .cloned()
}

/// Strongly connected components of the subgraph induced by `in_set`
/// (iterative Tarjan).
fn strongly_connected(nodes: &[usize], edges: &[Vec<usize>], in_set: &[bool]) -> Vec<Vec<usize>> {
    let count = edges.len();
    let mut next_index = 0;
    let mut index: Vec<Option<usize>> = vec![None; count];
    let mut low_link = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut components = Vec::new();

    for &start in nodes {
        if index[start].is_some() {
            continue;
        }
        index[start] = Some(next_index);
        low_link[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        let mut frames: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            if frame.1 < edges[node].len() {
                let next = edges[node][frame.1];
                frame.1 += 1;
                if !in_set[next] {
                    continue;
                }
                match index[next] {
                    None => {
                        index[next] = Some(next_index);
                        low_link[next] = next_index;
                        next_index += 1;
                        stack.push(next);
                        on_stack[next] = true;
                        frames.push((next, 0));
                    }
                    Some(next_idx) if on_stack[next] => {
                        low_link[node] = low_link[node].min(next_idx);
                    }
                    Some(_) => {}
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    low_link[parent] = low_link[parent].min(low_link[node]);
                }
                if Some(low_link[node]) == index[node] {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }
    }
    components
}

/// Shortest dependency path from `start` back to itself, as
/// `[start, .., start]`.
fn cycle_through(start: usize, edges: &[Vec<usize>], in_set: &[bool]) -> Vec<usize> {
    let mut previous: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for &next in &edges[node] {
            if !in_set[next] {
                continue;
            }
            if next == start {
                let mut between = Vec::new();
                let mut current = node;
                while current != start {
                    between.push(current);
                    match previous.get(&current) {
                        Some(&parent) => current = parent,
                        None => break,
                    }
                }
                between.reverse();
                let mut path = vec![start];
                path.extend(between);
                path.push(start);
                return path;
            }
            if let std::collections::hash_map::Entry::Vacant(entry) = previous.entry(next) {
                entry.insert(node);
                queue.push_back(next);
            }
        }
    }
    vec![start]
}

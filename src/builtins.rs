//! Static documentation for the built-in template objects and functions.

pub struct Namespace {
    pub name: &'static str,
    pub doc: &'static str,
    pub fields: &'static [FieldDoc],
}

pub struct FieldDoc {
    pub name: &'static str,
    pub doc: &'static str,
}

pub struct FunctionDoc {
    pub name: &'static str,
    pub signature: &'static str,
    pub doc: &'static str,
}

const fn field(name: &'static str, doc: &'static str) -> FieldDoc {
    FieldDoc { name, doc }
}

const fn func(name: &'static str, signature: &'static str, doc: &'static str) -> FunctionDoc {
    FunctionDoc {
        name,
        signature,
        doc,
    }
}

pub static NAMESPACES: &[Namespace] = &[
    Namespace {
        name: "Values",
        doc: "Values passed into the template from the values.yaml file and from user-supplied files. By default, Values is empty.",
        fields: &[],
    },
    Namespace {
        name: "Chart",
        doc: "The contents of the Chart.yaml file. Any data in Chart.yaml will be accessible here.",
        fields: CHART_FIELDS,
    },
    Namespace {
        name: "Release",
        doc: "This object describes the release itself.",
        fields: RELEASE_FIELDS,
    },
    Namespace {
        name: "Capabilities",
        doc: "This provides information about what capabilities the Kubernetes cluster supports.",
        fields: CAPABILITIES_FIELDS,
    },
    Namespace {
        name: "Files",
        doc: "This provides access to all non-special files in a chart. While you cannot use it to access templates, you can use it to access other files in the chart.",
        fields: FILES_FIELDS,
    },
    Namespace {
        name: "Template",
        doc: "Contains information about the current template that is being executed.",
        fields: TEMPLATE_FIELDS,
    },
];

static CHART_FIELDS: &[FieldDoc] = &[
    field("APIVersion", "The chart API version (required)"),
    field("Name", "The name of the chart (required)"),
    field("Version", "A SemVer 2 version (required)"),
    field("KubeVersion", "A SemVer range of compatible Kubernetes versions (optional)"),
    field("Description", "A single-sentence description of this project (optional)"),
    field("Type", "The type of the chart (optional)"),
    field("Keywords", "A list of keywords about this project (optional)"),
    field("Home", "The URL of this projects home page (optional)"),
    field("Sources", "A list of URLs to source code for this project (optional)"),
    field("Dependencies", "A list of the chart requirements (optional)"),
    field("Maintainers", "A list of the chart maintainers (optional)"),
    field("Icon", "A URL to an SVG or PNG image to be used as an icon (optional)."),
    field("AppVersion", "The version of the app that this contains (optional). Needn't be SemVer. Quotes recommended."),
    field("Deprecated", "Whether this chart is deprecated (optional, boolean)"),
    field("Annotations", "A list of annotations keyed by name (optional)."),
];

static RELEASE_FIELDS: &[FieldDoc] = &[
    field("Name", "The release name"),
    field("Namespace", "The namespace to be released into (if the manifest doesn't override)"),
    field("IsUpgrade", "This is set to true if the current operation is an upgrade or rollback."),
    field("IsInstall", "This is set to true if the current operation is an install."),
    field("Revision", "The revision number for this release. On install, this is 1, and it is incremented with each upgrade and rollback."),
    field("Service", "The service that is rendering the present template. On Helm, this is always Helm."),
];

static CAPABILITIES_FIELDS: &[FieldDoc] = &[
    field("APIVersions", "A set of versions."),
    field("APIVersions.Has", "Indicates whether a version (e.g., batch/v1) or resource (e.g., apps/v1/Deployment) is available on the cluster."),
    field("KubeVersion", "The Kubernetes version."),
    field("KubeVersion.Version", "The Kubernetes version in semver format."),
    field("KubeVersion.Major", "The Kubernetes major version."),
    field("KubeVersion.Minor", "The Kubernetes minor version."),
    field("KubeVersion.GitCommit", "The Kubernetes git sha1."),
    field("KubeVersion.GitTreeState", "The state of the Kubernetes git tree."),
    field("HelmVersion", "The object containing the Helm Version details, it is the same output of helm version."),
    field("HelmVersion.Version", "The current Helm version in semver format."),
    field("HelmVersion.GitCommit", "The Helm git sha1."),
    field("HelmVersion.GitTreeState", "The state of the Helm git tree."),
    field("HelmVersion.GoVersion", "The version of the Go compiler used."),
];

static FILES_FIELDS: &[FieldDoc] = &[
    field("Get", "A function for getting a file by name (.Files.Get config.ini)"),
    field("GetBytes", "A function for getting the contents of a file as an array of bytes instead of as a string. This is useful for things like images."),
    field("Glob", "A function that returns a list of files whose names match the given shell glob pattern."),
    field("Lines", "A function that reads a file line-by-line. This is useful for iterating over each line in a file."),
    field("AsSecrets", "A function that returns the file bodies as Base 64 encoded strings."),
    field("AsConfig", "A function that returns file bodies as a YAML map."),
];

static TEMPLATE_FIELDS: &[FieldDoc] = &[
    field("Name", "A namespaced file path to the current template (e.g. mychart/templates/mytemplate.yaml)"),
    field("BasePath", "The namespaced path to the templates directory of the current chart (e.g. mychart/templates)."),
];

pub static FUNCTIONS: &[FunctionDoc] = &[
    func("include", "include $name $context", "Renders the named template with the given context and returns the result as a string, so it can be piped."),
    func("template", "template $name $context", "Renders the named template in place. The result cannot be piped; prefer include."),
    func("tpl", "tpl $template $context", "Evaluates a string as a template inside a template."),
    func("required", "required $message $value", "Fails the rendering with the message when the value is empty."),
    func("default", "default $default $value", "Returns the value, or the default when the value is empty."),
    func("empty", "empty $value", "Returns true when the value is the zero value of its type."),
    func("coalesce", "coalesce $values...", "Returns the first non-empty value."),
    func("ternary", "ternary $whenTrue $whenFalse $condition", "Returns the first value when the condition is true, the second otherwise."),
    func("quote", "quote $value", "Wraps the string representation of the value in double quotes."),
    func("squote", "squote $value", "Wraps the string representation of the value in single quotes."),
    func("print", "print $values...", "Concatenates the string forms of the values."),
    func("printf", "printf $format $values...", "Formats according to a format specifier."),
    func("println", "println $values...", "Like print, with a trailing newline."),
    func("upper", "upper $string", "Converts the string to upper case."),
    func("lower", "lower $string", "Converts the string to lower case."),
    func("title", "title $string", "Converts the string to title case."),
    func("trim", "trim $string", "Removes leading and trailing whitespace."),
    func("trimSuffix", "trimSuffix $suffix $string", "Removes the suffix from the string."),
    func("trimPrefix", "trimPrefix $prefix $string", "Removes the prefix from the string."),
    func("trunc", "trunc $length $string", "Truncates the string to the given length."),
    func("replace", "replace $old $new $string", "Replaces every occurrence of old with new."),
    func("contains", "contains $substring $string", "Reports whether the string contains the substring."),
    func("hasPrefix", "hasPrefix $prefix $string", "Reports whether the string starts with the prefix."),
    func("hasSuffix", "hasSuffix $suffix $string", "Reports whether the string ends with the suffix."),
    func("indent", "indent $count $string", "Indents every line of the string by count spaces."),
    func("nindent", "nindent $count $string", "Like indent, but prepends a newline."),
    func("toYaml", "toYaml $value", "Serializes the value to a YAML document."),
    func("fromYaml", "fromYaml $string", "Parses a YAML document into a dictionary."),
    func("toJson", "toJson $value", "Serializes the value to JSON."),
    func("fromJson", "fromJson $string", "Parses a JSON document into a dictionary."),
    func("b64enc", "b64enc $string", "Encodes the string with Base64."),
    func("b64dec", "b64dec $string", "Decodes a Base64 string."),
    func("sha256sum", "sha256sum $string", "Computes the SHA-256 digest of the string."),
    func("list", "list $values...", "Creates a list from the values."),
    func("dict", "dict $key $value ...", "Creates a dictionary from alternating keys and values."),
    func("get", "get $dict $key", "Returns the value stored under the key."),
    func("set", "set $dict $key $value", "Stores a value under the key and returns the dictionary."),
    func("hasKey", "hasKey $dict $key", "Reports whether the dictionary contains the key."),
    func("keys", "keys $dicts...", "Returns the keys of the dictionaries."),
    func("merge", "merge $dest $sources...", "Deep-merges the sources into dest, dest winning on conflicts."),
    func("mergeOverwrite", "mergeOverwrite $dest $sources...", "Deep-merges the sources into dest, the sources winning on conflicts."),
    func("lookup", "lookup $apiVersion $kind $namespace $name", "Looks up a resource in the running cluster."),
    func("eq", "eq $a $b", "Reports whether the arguments are equal."),
    func("ne", "ne $a $b", "Reports whether the arguments differ."),
    func("lt", "lt $a $b", "Reports whether a is less than b."),
    func("gt", "gt $a $b", "Reports whether a is greater than b."),
    func("and", "and $values...", "Returns the first empty argument or the last argument."),
    func("or", "or $values...", "Returns the first non-empty argument or the last argument."),
    func("not", "not $value", "Returns the boolean negation of the argument."),
    func("len", "len $value", "Returns the length of the argument."),
    func("index", "index $collection $keys...", "Indexes into maps, slices and arrays."),
    func("add", "add $numbers...", "Sums the numbers."),
    func("toString", "toString $value", "Converts the value to a string."),
    func("int", "int $value", "Converts the value to an int."),
    func("fail", "fail $message", "Unconditionally fails the rendering with the message."),
];

pub fn namespace(name: &str) -> Option<&'static Namespace> {
    NAMESPACES.iter().find(|namespace| namespace.name == name)
}

/// Documentation of `Namespace.path`, where `path` may be nested (`KubeVersion.Major`).
/// An empty path yields the namespace's own description.
pub fn field_doc(namespace: &str, path: &str) -> Option<&'static str> {
    let namespace = self::namespace(namespace)?;
    if path.is_empty() {
        return Some(namespace.doc);
    }
    namespace
        .fields
        .iter()
        .find(|field| field.name == path)
        .map(|field| field.doc)
}

pub fn function(name: &str) -> Option<&'static FunctionDoc> {
    FUNCTIONS.iter().find(|function| function.name == name)
}
